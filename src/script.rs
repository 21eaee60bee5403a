//! The PSA narrative, supplied as literal in-process configuration.

use crate::seq::{Game, GameConfig, Message, Panel, Playable, Span};

/// Inter-panel delay for narrative messages, ms
const PANEL_DELAY_MS: f64 = 2600.0;
/// Per-character reveal delay for typed passages, ms
const CHAR_DELAY_MS: f64 = 30.0;

/// Build the full narrative sequence, in playback order.
pub fn narrative() -> Vec<Box<dyn Playable>> {
    vec![
        Box::new(intro()),
        Box::new(facts()),
        Box::new(briefing()),
        Box::new(Game::new(session_config())),
        Box::new(outro()),
    ]
}

fn intro() -> Message {
    Message::new(
        vec![
            Panel::new(vec![
                Span::typed("It's 1:40 am."),
                Span::typed(" You told yourself you'd stop for the night an hour ago."),
            ]),
            Panel::typed("The road hums. Your eyelids get a little heavier every mile."),
        ],
        PANEL_DELAY_MS,
    )
    .with_char_delay(CHAR_DELAY_MS)
}

fn facts() -> Message {
    Message::new(
        vec![
            Panel::plain(
                "Drowsiness is a factor in roughly <em>one in five</em> fatal crashes.",
            ),
            Panel::plain(
                "A <em>microsleep</em> lasts up to ten seconds. At highway speed that is \
                 two football fields with your eyes closed.",
            ),
        ],
        PANEL_DELAY_MS,
    )
}

fn briefing() -> Message {
    Message::new(
        vec![Panel::plain(
            "Let's measure your reactions. When a lane marking flashes, press \
             <strong>space</strong> or click - every flash, as fast as you can. \
             <span class=\"nav-next\">Start the drive &rarr;</span>",
        )],
        PANEL_DELAY_MS,
    )
}

fn session_config() -> GameConfig {
    GameConfig {
        duration_s: 12,
        target_speed: 60.0,
        reset_speed: crate::consts::IDLE_SPEED_MPH,
        microsleep_probability: 0.12,
        flicker_ms: 400.0,
        flicker_delay_ms: 1800.0,
        flicker_spread_ms: 900.0,
    }
}

fn outro() -> Message {
    Message::new(
        vec![
            Panel::plain(
                "Hard to catch them all with the screen going dark? \
                 That darkness was a fraction of one microsleep.",
            ),
            Panel::plain(
                "Tired? <strong>Pull over.</strong> A twenty-minute nap beats \
                 not arriving at all.",
            ),
        ],
        PANEL_DELAY_MS,
    )
}
