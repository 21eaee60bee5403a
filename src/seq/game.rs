//! The reaction-time session: countdown, stimulus flickers, microsleep
//! dimming, and response scoring.

use rand::Rng;

use super::playable::{Cue, DimParams, FrameInput, PlayContext, Playable, StageEvent};
use super::schedule::{CancelToken, TimerId};
use crate::consts::*;
use crate::road::STIMULUS_COLOR;

/// Session tuning.
#[derive(Debug, Clone, Copy)]
pub struct GameConfig {
    /// Measured portion of the session, seconds
    pub duration_s: u32,
    /// Road speed while the session is live, mph
    pub target_speed: f32,
    /// Road speed restored when the session ends, mph
    pub reset_speed: f32,
    /// Chance per dimmer cycle of a simulated microsleep
    pub microsleep_probability: f64,
    /// How long a stimulus flicker stays lit, ms
    pub flicker_ms: f64,
    /// Base delay between stimuli, ms
    pub flicker_delay_ms: f64,
    /// Uniform jitter applied to the base delay, ms
    pub flicker_spread_ms: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            duration_s: 10,
            target_speed: 60.0,
            reset_speed: IDLE_SPEED_MPH,
            microsleep_probability: 0.1,
            flicker_ms: 400.0,
            flicker_delay_ms: 1800.0,
            flicker_spread_ms: 900.0,
        }
    }
}

/// Current phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Constructed, never started
    Idle,
    /// Pre-roll countdown (3, 2, 1)
    Countdown,
    /// Live: stimuli firing, responses counted
    Active,
    /// Time exhausted, results displayed
    Scoring,
    /// Shut down externally
    Stopped,
}

/// Response accuracy vs. stimulus count, percent with two decimals.
///
/// A session with no stimuli has no measurable error and scores 0.00 - the
/// division is never left undefined.
pub fn error_percent(hits: u32, flickers: u32) -> f64 {
    if flickers == 0 {
        return 0.0;
    }
    let raw = (hits as f64 / flickers as f64 - 1.0).abs() * 100.0;
    (raw * 100.0).round() / 100.0
}

pub struct Game {
    cfg: GameConfig,
    phase: GamePhase,
    /// Whole seconds since the session started
    seconds: u32,
    hits: u32,
    flickers: u32,
    second_timer: Option<TimerId>,
    flicker_timer: Option<TimerId>,
    token: CancelToken,
}

impl Game {
    pub fn new(cfg: GameConfig) -> Self {
        Self {
            cfg,
            phase: GamePhase::Idle,
            seconds: 0,
            hits: 0,
            flickers: 0,
            second_timer: None,
            flicker_timer: None,
            token: CancelToken::cancelled(),
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn flickers(&self) -> u32 {
        self.flickers
    }

    fn dim_params(&self) -> DimParams {
        DimParams {
            min_opacity: MICROSLEEP_MIN_OPACITY,
            max_opacity: MICROSLEEP_MAX_OPACITY,
            transition_ms: MICROSLEEP_TRANSITION_MS,
            delay_ms: MICROSLEEP_DELAY_MS,
            probability: self.cfg.microsleep_probability,
        }
    }

    fn on_second(&mut self, ctx: &mut PlayContext<'_>) {
        self.seconds += 1;
        let s = self.seconds;

        if s < COUNTDOWN_SECONDS {
            ctx.events.push(StageEvent::Countdown(COUNTDOWN_SECONDS - s));
            ctx.events.push(StageEvent::PlayCue(Cue::CountdownBeep));
        } else if s == COUNTDOWN_SECONDS {
            self.go_live(ctx);
        } else {
            let elapsed = s - COUNTDOWN_SECONDS;
            if elapsed <= self.cfg.duration_s {
                ctx.events
                    .push(StageEvent::TimeRemaining(self.cfg.duration_s - elapsed));
            } else {
                self.score(ctx);
                return;
            }
        }
        self.second_timer = Some(ctx.timers.schedule(ctx.now, 1000.0));
    }

    /// Countdown finished: attach responses, begin stimuli and microsleeps,
    /// bring the road up to speed. Runs once per session.
    fn go_live(&mut self, ctx: &mut PlayContext<'_>) {
        self.phase = GamePhase::Active;
        ctx.events.push(StageEvent::ClearStage);
        ctx.events.push(StageEvent::TimeRemaining(self.cfg.duration_s));
        ctx.events.push(StageEvent::DimStart(self.dim_params()));
        ctx.events.push(StageEvent::PlayCue(Cue::SessionStart));
        ctx.road.set_speed(self.cfg.target_speed);
        self.schedule_flicker(ctx);
    }

    /// Next stimulus after `flicker_delay ± flicker_spread`, uniform.
    fn schedule_flicker(&mut self, ctx: &mut PlayContext<'_>) {
        let spread = self.cfg.flicker_spread_ms;
        let jitter = if spread > 0.0 {
            ctx.rng.random_range(-spread..=spread)
        } else {
            0.0
        };
        let delay = (self.cfg.flicker_delay_ms + jitter).max(0.0);
        self.flicker_timer = Some(ctx.timers.schedule(ctx.now, delay));
    }

    fn on_flicker(&mut self, ctx: &mut PlayContext<'_>) {
        ctx.road
            .flicker_random(STIMULUS_COLOR, self.cfg.flicker_ms, ctx.now, ctx.rng);
        self.flickers += 1;
        self.schedule_flicker(ctx);
    }

    fn score(&mut self, ctx: &mut PlayContext<'_>) {
        self.phase = GamePhase::Scoring;
        self.shutdown(ctx);
        ctx.events.push(StageEvent::ShowResults {
            hits: self.hits,
            flickers: self.flickers,
            error_pct: error_percent(self.hits, self.flickers),
        });
        ctx.events.push(StageEvent::PlayCue(Cue::TimeUp));
    }

    /// Tear the session down: cancel the token and both deadlines, restore
    /// the road speed, stop the dimmer. Idempotent.
    fn shutdown(&mut self, ctx: &mut PlayContext<'_>) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        if let Some(id) = self.second_timer.take() {
            ctx.timers.cancel(id);
        }
        if let Some(id) = self.flicker_timer.take() {
            ctx.timers.cancel(id);
        }
        ctx.road.set_speed(self.cfg.reset_speed);
        ctx.events.push(StageEvent::DimStop);
    }
}

impl Playable for Game {
    fn start(&mut self, ctx: &mut PlayContext<'_>) {
        self.token = CancelToken::new();
        self.phase = GamePhase::Countdown;
        self.seconds = 0;
        self.hits = 0;
        self.flickers = 0;

        ctx.events.push(StageEvent::ClearStage);
        ctx.events.push(StageEvent::ShowStats(true));
        ctx.events.push(StageEvent::Countdown(COUNTDOWN_SECONDS));
        ctx.events.push(StageEvent::TimeRemaining(self.cfg.duration_s));
        ctx.road.set_speed(0.0);
        self.second_timer = Some(ctx.timers.schedule(ctx.now, 1000.0));
    }

    fn stop(&mut self, ctx: &mut PlayContext<'_>) {
        self.shutdown(ctx);
        self.phase = GamePhase::Stopped;
    }

    fn update(&mut self, input: &FrameInput, ctx: &mut PlayContext<'_>) {
        // Same cancellation discipline as Message: check before acting.
        if self.token.is_cancelled() {
            return;
        }

        if input.hit && self.phase == GamePhase::Active {
            self.hits += 1;
            ctx.events.push(StageEvent::StatHits(self.hits));
            ctx.events.push(StageEvent::PlayCue(Cue::Hit));
        }

        if ctx.timer_fired(self.second_timer) {
            self.second_timer = None;
            self.on_second(ctx);
        }
        if ctx.timer_fired(self.flicker_timer) {
            self.flicker_timer = None;
            self.on_flicker(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::testutil::TestStage;

    const INPUT: FrameInput = FrameInput {
        hit: false,
        typing_done: false,
        next: false,
        previous: false,
    };
    const HIT: FrameInput = FrameInput {
        hit: true,
        typing_done: false,
        next: false,
        previous: false,
    };

    fn quick_config() -> GameConfig {
        GameConfig {
            duration_s: 2,
            target_speed: 60.0,
            reset_speed: 10.0,
            ..Default::default()
        }
    }

    /// Drive a full second-by-second session to completion, pressing `hits`
    /// responses during the live window.
    fn run_session(game: &mut Game, stage: &mut TestStage, hits: u32) {
        stage.with_ctx(0.0, |ctx| game.start(ctx));
        let mut pressed = 0;
        for s in 1..=20 {
            let input = if game.phase() == GamePhase::Active && pressed < hits {
                pressed += 1;
                HIT
            } else {
                INPUT
            };
            stage.with_ctx(s as f64 * 1000.0, |ctx| game.update(&input, ctx));
            if game.phase() == GamePhase::Scoring {
                return;
            }
        }
        panic!("session never reached scoring");
    }

    #[test]
    fn test_error_percent() {
        assert_eq!(error_percent(5, 4), 25.0);
        assert_eq!(error_percent(4, 4), 0.0);
        assert_eq!(error_percent(2, 3), 33.33);
        // No stimuli: defined as zero error, never NaN.
        assert_eq!(error_percent(0, 0), 0.0);
        assert_eq!(error_percent(3, 0), 0.0);
    }

    #[test]
    fn test_countdown_sequence() {
        let mut game = Game::new(quick_config());
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| game.start(ctx));
        let events = stage.take_events();
        assert!(events.contains(&StageEvent::Countdown(3)));
        assert!(events.contains(&StageEvent::TimeRemaining(2)));
        assert_eq!(stage.road.speed(), 0.0);
        assert_eq!(game.phase(), GamePhase::Countdown);

        stage.with_ctx(1000.0, |ctx| game.update(&INPUT, ctx));
        assert!(stage.take_events().contains(&StageEvent::Countdown(2)));

        stage.with_ctx(2000.0, |ctx| game.update(&INPUT, ctx));
        assert!(stage.take_events().contains(&StageEvent::Countdown(1)));
        assert_eq!(game.phase(), GamePhase::Countdown);

        stage.with_ctx(3000.0, |ctx| game.update(&INPUT, ctx));
        let events = stage.take_events();
        assert_eq!(game.phase(), GamePhase::Active);
        assert!(events.contains(&StageEvent::PlayCue(Cue::SessionStart)));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, StageEvent::DimStart(p) if p.probability == 0.1))
        );
        assert_eq!(stage.road.speed(), 60.0);
    }

    #[test]
    fn test_session_times_out_into_scoring() {
        let mut game = Game::new(quick_config());
        let mut stage = TestStage::new();
        run_session(&mut game, &mut stage, 0);

        assert_eq!(game.phase(), GamePhase::Scoring);
        let events = stage.take_events();
        assert!(events.contains(&StageEvent::DimStop));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, StageEvent::ShowResults { .. }))
        );
        // Road back to the reset speed.
        assert_eq!(stage.road.speed(), 10.0);
        // Every session deadline cancelled.
        assert_eq!(stage.timers.pending_count(), 0);
    }

    #[test]
    fn test_hits_count_only_while_active() {
        let mut game = Game::new(quick_config());
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| game.start(ctx));
        // Countdown: responses ignored.
        stage.with_ctx(500.0, |ctx| game.update(&HIT, ctx));
        assert_eq!(game.hits(), 0);

        for s in 1..=3 {
            stage.with_ctx(s as f64 * 1000.0, |ctx| game.update(&INPUT, ctx));
        }
        assert_eq!(game.phase(), GamePhase::Active);

        stage.with_ctx(3500.0, |ctx| game.update(&HIT, ctx));
        stage.with_ctx(3600.0, |ctx| game.update(&HIT, ctx));
        assert_eq!(game.hits(), 2);
    }

    #[test]
    fn test_flicker_loop_counts_stimuli() {
        let cfg = GameConfig {
            duration_s: 10,
            flicker_delay_ms: 500.0,
            flicker_spread_ms: 0.0,
            ..quick_config()
        };
        let mut game = Game::new(cfg);
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| game.start(ctx));
        for s in 1..=3 {
            stage.with_ctx(s as f64 * 1000.0, |ctx| game.update(&INPUT, ctx));
        }
        assert_eq!(game.phase(), GamePhase::Active);
        assert_eq!(game.flickers(), 0);

        // Stimuli fire every 500ms with zero spread.
        stage.with_ctx(3500.0, |ctx| game.update(&INPUT, ctx));
        assert_eq!(game.flickers(), 1);
        stage.with_ctx(4000.0, |ctx| game.update(&INPUT, ctx));
        assert_eq!(game.flickers(), 2);

        // The flicker actually landed on a road line.
        let lit = stage
            .road
            .lines()
            .any(|l| l.color() == crate::road::STIMULUS_COLOR);
        assert!(lit);
    }

    #[test]
    fn test_scoring_uses_session_counts() {
        let cfg = GameConfig {
            duration_s: 4,
            flicker_delay_ms: 1000.0,
            flicker_spread_ms: 0.0,
            ..quick_config()
        };
        let mut game = Game::new(cfg);
        let mut stage = TestStage::new();
        run_session(&mut game, &mut stage, 2);

        let events = stage.take_events();
        let result = events
            .iter()
            .find_map(|e| match e {
                StageEvent::ShowResults {
                    hits,
                    flickers,
                    error_pct,
                } => Some((*hits, *flickers, *error_pct)),
                _ => None,
            })
            .expect("results shown");
        assert_eq!(result.0, 2);
        assert_eq!(result.2, error_percent(result.0, result.1));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut game = Game::new(quick_config());
        let mut stage = TestStage::new();

        stage.with_ctx(0.0, |ctx| game.start(ctx));
        stage.with_ctx(100.0, |ctx| game.stop(ctx));
        assert_eq!(game.phase(), GamePhase::Stopped);
        assert_eq!(stage.road.speed(), 10.0);
        assert_eq!(stage.timers.pending_count(), 0);

        let before = stage.take_events();
        assert_eq!(before.iter().filter(|e| **e == StageEvent::DimStop).count(), 1);

        // Second stop: no throw, no duplicate teardown.
        stage.with_ctx(200.0, |ctx| game.stop(ctx));
        assert!(stage.take_events().is_empty());

        // Ticks queued before the stop no longer act.
        stage.with_ctx(5000.0, |ctx| game.update(&INPUT, ctx));
        assert!(stage.take_events().is_empty());
    }

    #[test]
    fn test_restart_resets_counters() {
        let mut game = Game::new(quick_config());
        let mut stage = TestStage::new();
        run_session(&mut game, &mut stage, 3);
        assert!(game.hits() > 0);

        stage.with_ctx(60_000.0, |ctx| game.start(ctx));
        assert_eq!(game.hits(), 0);
        assert_eq!(game.flickers(), 0);
        assert_eq!(game.phase(), GamePhase::Countdown);
    }
}
