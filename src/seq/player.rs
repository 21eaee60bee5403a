//! The narrative sequencer: an ordered list of playables, one current.

use std::fmt;

use super::playable::{FrameInput, PlayContext, Playable, StageEvent};

/// Sequencer construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    /// A player needs at least one segment
    InvalidConfiguration,
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::InvalidConfiguration => {
                write!(f, "player requires at least one playable segment")
            }
        }
    }
}

impl std::error::Error for SequenceError {}

/// Drives the segments in order and enforces the stop-before-start
/// transition discipline. Navigation past either end is a no-op.
pub struct Player {
    segments: Vec<Box<dyn Playable>>,
    /// None until the first activation
    index: Option<usize>,
}

impl Player {
    pub fn new(segments: Vec<Box<dyn Playable>>) -> Result<Self, SequenceError> {
        if segments.is_empty() {
            return Err(SequenceError::InvalidConfiguration);
        }
        Ok(Self {
            segments,
            index: None,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// First activation: land on segment 0 and start it.
    pub fn begin(&mut self, ctx: &mut PlayContext<'_>) {
        if self.index.is_some() {
            return;
        }
        self.index = Some(0);
        self.emit_nav(ctx);
        if self.segments.len() == 1 {
            ctx.events.push(StageEvent::BindArrowKeys);
        }
        self.segments[0].start(ctx);
    }

    /// Sync the current index and affordance state without any stop/start
    /// transition. Out-of-range indices are ignored.
    pub fn seek(&mut self, index: usize, ctx: &mut PlayContext<'_>) {
        if index >= self.segments.len() {
            return;
        }
        self.index = Some(index);
        self.emit_nav(ctx);
    }

    /// Full transition to the next segment. No-op at the end of the list.
    pub fn next(&mut self, ctx: &mut PlayContext<'_>) {
        let Some(i) = self.index else { return };
        if i + 1 >= self.segments.len() {
            return;
        }
        self.transition(i, i + 1, ctx);
    }

    /// Full transition to the previous segment. No-op at the start.
    pub fn previous(&mut self, ctx: &mut PlayContext<'_>) {
        let Some(i) = self.index else { return };
        if i == 0 {
            return;
        }
        self.transition(i, i - 1, ctx);
    }

    /// The outgoing segment is stopped before the incoming one starts.
    fn transition(&mut self, from: usize, to: usize, ctx: &mut PlayContext<'_>) {
        self.segments[from].stop(ctx);
        self.index = Some(to);
        self.emit_nav(ctx);
        if to + 1 == self.segments.len() {
            // Terminal segment: arrow keys are rebound fresh on each arrival.
            ctx.events.push(StageEvent::BindArrowKeys);
        }
        self.segments[to].start(ctx);
    }

    fn emit_nav(&self, ctx: &mut PlayContext<'_>) {
        let Some(i) = self.index else { return };
        ctx.events.push(StageEvent::NavState {
            prev_enabled: i > 0,
            next_enabled: i + 1 < self.segments.len(),
        });
    }

    /// Route navigation input, then run the current segment's frame.
    pub fn update(&mut self, input: &FrameInput, ctx: &mut PlayContext<'_>) {
        if input.next {
            self.next(ctx);
        }
        if input.previous {
            self.previous(ctx);
        }
        if let Some(i) = self.index {
            self.segments[i].update(input, ctx);
        }
    }
}
