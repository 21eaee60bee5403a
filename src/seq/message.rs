//! Sequenced narrative text panels with optional per-character typing.

use super::playable::{FrameInput, PlayContext, Playable, StageEvent};
use super::schedule::{CancelToken, TimerId};

/// Default per-character reveal delay for typed spans, ms
pub const DEFAULT_CHAR_DELAY_MS: f64 = 28.0;

/// A run of panel content, revealed instantly or via the typing effect.
#[derive(Debug, Clone)]
pub struct Span {
    pub html: String,
    pub typed: bool,
}

impl Span {
    pub fn plain(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            typed: false,
        }
    }

    pub fn typed(text: impl Into<String>) -> Self {
        Self {
            html: text.into(),
            typed: true,
        }
    }
}

/// One narrative panel: an ordered run of spans.
#[derive(Debug, Clone)]
pub struct Panel {
    pub spans: Vec<Span>,
}

impl Panel {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn plain(html: impl Into<String>) -> Self {
        Self::new(vec![Span::plain(html)])
    }

    pub fn typed(text: impl Into<String>) -> Self {
        Self::new(vec![Span::typed(text)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessagePhase {
    Idle,
    Playing { panel: usize, span: usize },
    Finished,
}

/// Plays its panels in order, waiting zero before the first and `delay_ms`
/// between subsequent ones. Typed spans hand off to the typing effect and
/// resume on its completion signal.
pub struct Message {
    panels: Vec<Panel>,
    delay_ms: f64,
    char_delay_ms: f64,
    phase: MessagePhase,
    timer: Option<TimerId>,
    token: CancelToken,
}

impl Message {
    pub fn new(panels: Vec<Panel>, delay_ms: f64) -> Self {
        Self {
            panels,
            delay_ms,
            char_delay_ms: DEFAULT_CHAR_DELAY_MS,
            phase: MessagePhase::Idle,
            timer: None,
            token: CancelToken::cancelled(),
        }
    }

    /// Per-character reveal delay for typed spans.
    pub fn with_char_delay(mut self, ms: f64) -> Self {
        self.char_delay_ms = ms;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.phase == MessagePhase::Finished
    }

    fn show_panel(&mut self, idx: usize, ctx: &mut PlayContext<'_>) {
        if idx >= self.panels.len() {
            self.phase = MessagePhase::Finished;
            return;
        }
        self.phase = MessagePhase::Playing {
            panel: idx,
            span: 0,
        };
        ctx.events.push(StageEvent::ShowPanel);
        self.play_spans(ctx);
    }

    /// Reveal spans until one needs the typing effect or the panel ends.
    fn play_spans(&mut self, ctx: &mut PlayContext<'_>) {
        let MessagePhase::Playing { panel, mut span } = self.phase else {
            return;
        };
        while let Some(s) = self.panels[panel].spans.get(span) {
            if s.typed {
                ctx.events.push(StageEvent::BeginTyping {
                    text: s.html.clone(),
                    char_delay_ms: self.char_delay_ms,
                });
                self.phase = MessagePhase::Playing { panel, span };
                return;
            }
            ctx.events.push(StageEvent::AppendSpan {
                html: s.html.clone(),
            });
            span += 1;
        }
        self.phase = MessagePhase::Playing { panel, span };
        self.finish_panel(ctx);
    }

    fn finish_panel(&mut self, ctx: &mut PlayContext<'_>) {
        let MessagePhase::Playing { panel, .. } = self.phase else {
            return;
        };
        if panel + 1 < self.panels.len() {
            self.timer = Some(ctx.timers.schedule(ctx.now, self.delay_ms));
        } else {
            self.phase = MessagePhase::Finished;
        }
    }
}

impl Playable for Message {
    fn start(&mut self, ctx: &mut PlayContext<'_>) {
        self.token = CancelToken::new();
        self.phase = MessagePhase::Idle;
        ctx.events.push(StageEvent::HideAux);
        // Zero wait before the first panel, `delay_ms` between the rest.
        self.timer = Some(ctx.timers.schedule(ctx.now, 0.0));
    }

    fn stop(&mut self, ctx: &mut PlayContext<'_>) {
        self.token.cancel();
        if let Some(id) = self.timer.take() {
            ctx.timers.cancel(id);
        }
    }

    fn update(&mut self, input: &FrameInput, ctx: &mut PlayContext<'_>) {
        // Check-before-act: a continuation already queued when stop ran must
        // not produce effects.
        if self.token.is_cancelled() {
            return;
        }

        if input.typing_done {
            if let MessagePhase::Playing { panel, span } = self.phase {
                let typed = self.panels[panel]
                    .spans
                    .get(span)
                    .is_some_and(|s| s.typed);
                if typed {
                    self.phase = MessagePhase::Playing {
                        panel,
                        span: span + 1,
                    };
                    self.play_spans(ctx);
                }
            }
        }

        if ctx.timer_fired(self.timer) {
            self.timer = None;
            match self.phase {
                MessagePhase::Idle => self.show_panel(0, ctx),
                MessagePhase::Playing { panel, .. } => self.show_panel(panel + 1, ctx),
                MessagePhase::Finished => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::testutil::TestStage;

    fn panel_html(events: &[StageEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                StageEvent::AppendSpan { html } => Some(html.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_panel_shows_after_zero_wait() {
        let mut msg = Message::new(vec![Panel::plain("A")], 0.0);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| msg.start(ctx));
        assert!(stage.take_events().contains(&StageEvent::HideAux));

        stage.with_ctx(0.0, |ctx| msg.update(&FrameInput::default(), ctx));
        let events = stage.take_events();
        assert!(events.contains(&StageEvent::ShowPanel));
        assert_eq!(panel_html(&events), vec!["A"]);
        assert!(msg.is_finished());
    }

    #[test]
    fn test_panels_are_delayed_sequentially() {
        let mut msg = Message::new(vec![Panel::plain("B"), Panel::plain("C")], 100.0);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| msg.start(ctx));
        stage.take_events();

        stage.with_ctx(0.0, |ctx| msg.update(&FrameInput::default(), ctx));
        assert_eq!(panel_html(&stage.take_events()), vec!["B"]);

        stage.with_ctx(50.0, |ctx| msg.update(&FrameInput::default(), ctx));
        assert!(panel_html(&stage.take_events()).is_empty());

        stage.with_ctx(100.0, |ctx| msg.update(&FrameInput::default(), ctx));
        assert_eq!(panel_html(&stage.take_events()), vec!["C"]);
        assert!(msg.is_finished());
    }

    #[test]
    fn test_typed_spans_wait_for_completion() {
        let panel = Panel::new(vec![Span::typed("one"), Span::typed("two")]);
        let mut msg = Message::new(vec![panel], 0.0).with_char_delay(10.0);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| msg.start(ctx));
        stage.take_events();

        stage.with_ctx(0.0, |ctx| msg.update(&FrameInput::default(), ctx));
        let events = stage.take_events();
        assert!(events.contains(&StageEvent::BeginTyping {
            text: "one".into(),
            char_delay_ms: 10.0
        }));
        assert!(!msg.is_finished());

        // No progress without the completion signal.
        stage.with_ctx(500.0, |ctx| msg.update(&FrameInput::default(), ctx));
        assert!(stage.take_events().is_empty());

        let done = FrameInput {
            typing_done: true,
            ..Default::default()
        };
        stage.with_ctx(600.0, |ctx| msg.update(&done, ctx));
        let events = stage.take_events();
        assert!(events.contains(&StageEvent::BeginTyping {
            text: "two".into(),
            char_delay_ms: 10.0
        }));

        stage.with_ctx(700.0, |ctx| msg.update(&done, ctx));
        assert!(msg.is_finished());
    }

    #[test]
    fn test_mixed_spans_reveal_instantly_between_typed() {
        let panel = Panel::new(vec![
            Span::plain("<em>lead</em>"),
            Span::typed("typed part"),
            Span::plain("tail"),
        ]);
        let mut msg = Message::new(vec![panel], 0.0);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| msg.start(ctx));
        stage.take_events();

        stage.with_ctx(0.0, |ctx| msg.update(&FrameInput::default(), ctx));
        let events = stage.take_events();
        assert_eq!(panel_html(&events), vec!["<em>lead</em>"]);
        assert!(matches!(
            events.last(),
            Some(StageEvent::BeginTyping { .. })
        ));

        let done = FrameInput {
            typing_done: true,
            ..Default::default()
        };
        stage.with_ctx(100.0, |ctx| msg.update(&done, ctx));
        assert_eq!(panel_html(&stage.take_events()), vec!["tail"]);
        assert!(msg.is_finished());
    }

    #[test]
    fn test_stop_cancels_pending_panels() {
        let mut msg = Message::new(vec![Panel::plain("B"), Panel::plain("C")], 100.0);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| msg.start(ctx));
        stage.with_ctx(0.0, |ctx| msg.update(&FrameInput::default(), ctx));
        stage.take_events();

        stage.with_ctx(10.0, |ctx| msg.stop(ctx));
        assert_eq!(stage.timers.pending_count(), 0);

        // Nothing further, even well past the inter-panel delay.
        stage.with_ctx(1000.0, |ctx| msg.update(&FrameInput::default(), ctx));
        assert!(stage.take_events().is_empty());
    }

    #[test]
    fn test_double_stop_is_safe() {
        let mut msg = Message::new(vec![Panel::plain("A")], 0.0);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| msg.start(ctx));
        stage.with_ctx(0.0, |ctx| msg.stop(ctx));
        stage.with_ctx(0.0, |ctx| msg.stop(ctx));

        // Stop before any start is a no-op as well.
        let mut fresh = Message::new(vec![Panel::plain("A")], 0.0);
        stage.with_ctx(0.0, |ctx| fresh.stop(ctx));
    }

    #[test]
    fn test_restart_replays_from_first_panel() {
        let mut msg = Message::new(vec![Panel::plain("A")], 0.0);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| msg.start(ctx));
        stage.with_ctx(0.0, |ctx| msg.update(&FrameInput::default(), ctx));
        assert!(msg.is_finished());
        stage.with_ctx(5.0, |ctx| msg.stop(ctx));
        stage.take_events();

        stage.with_ctx(10.0, |ctx| msg.start(ctx));
        stage.with_ctx(10.0, |ctx| msg.update(&FrameInput::default(), ctx));
        assert_eq!(panel_html(&stage.take_events()), vec!["A"]);
    }
}
