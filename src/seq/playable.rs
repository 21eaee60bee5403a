//! Playable segments and the frame context they run in.

use rand_pcg::Pcg32;

use super::schedule::{Scheduler, TimerId};
use crate::road::Road;

/// One-shot input flags collected by the driver since the previous frame
/// (cleared after each update).
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    /// Spacebar/click response during the reaction game
    pub hit: bool,
    /// The typing effect finished revealing the current span
    pub typing_done: bool,
    /// Advance to the next segment
    pub next: bool,
    /// Back to the previous segment
    pub previous: bool,
}

/// Microsleep dimmer parameters: an opacity oscillation on the scene
/// element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimParams {
    pub min_opacity: f64,
    pub max_opacity: f64,
    pub transition_ms: f64,
    pub delay_ms: f64,
    /// Chance per cycle that a dim actually occurs
    pub probability: f64,
}

impl Default for DimParams {
    fn default() -> Self {
        Self {
            min_opacity: 0.7,
            max_opacity: 1.0,
            transition_ms: 200.0,
            delay_ms: 75.0,
            probability: 0.1,
        }
    }
}

/// Audio cues, procedurally generated by the driver's audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    CountdownBeep,
    SessionStart,
    Hit,
    TimeUp,
}

/// Side effects bound for the DOM/audio layer, drained by the driver after
/// each update.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// Open a fresh, empty narrative panel
    ShowPanel,
    /// Append a span to the current panel verbatim
    AppendSpan { html: String },
    /// Hand a span to the typing effect; completion comes back as
    /// [`FrameInput::typing_done`]
    BeginTyping { text: String, char_delay_ms: f64 },
    /// Clear the narrative display
    ClearStage,
    /// Hide auxiliary chrome while a message plays
    HideAux,
    /// Show or hide the session stats panel
    ShowStats(bool),
    /// Live hit count for the stats panel
    StatHits(u32),
    /// Countdown display value (3, 2, 1)
    Countdown(u32),
    /// Remaining session seconds
    TimeRemaining(u32),
    /// Start the probabilistic screen dimmer
    DimStart(DimParams),
    /// Stop the dimmer and restore full opacity
    DimStop,
    /// Session results panel (carries a Continue affordance)
    ShowResults {
        hits: u32,
        flickers: u32,
        error_pct: f64,
    },
    /// Navigation affordance enabled state
    NavState {
        prev_enabled: bool,
        next_enabled: bool,
    },
    /// (Re)bind arrow-key navigation, replacing any previous binding
    BindArrowKeys,
    /// Play an audio cue
    PlayCue(Cue),
}

/// Everything a playable may touch during one frame.
pub struct PlayContext<'a> {
    /// Current time in milliseconds (`performance.now()` or a test clock)
    pub now: f64,
    pub road: &'a mut Road,
    pub timers: &'a mut Scheduler,
    pub rng: &'a mut Pcg32,
    /// Deadlines that fired this frame
    pub fired: &'a [TimerId],
    /// Effect sink drained by the driver
    pub events: &'a mut Vec<StageEvent>,
}

impl PlayContext<'_> {
    /// Did `id` fire this frame?
    pub fn timer_fired(&self, id: Option<TimerId>) -> bool {
        id.is_some_and(|id| self.fired.contains(&id))
    }
}

/// A narrative or interactive segment with start/stop lifecycle hooks.
///
/// Contract: `start` activates a fresh session and is called once per
/// activation; `stop` is safe to call repeatedly, even if the segment
/// already finished, and cancels every deadline the session registered.
/// `update` runs once per frame while the segment is current.
pub trait Playable {
    fn start(&mut self, ctx: &mut PlayContext<'_>);
    fn stop(&mut self, ctx: &mut PlayContext<'_>);
    fn update(&mut self, input: &FrameInput, ctx: &mut PlayContext<'_>);
}
