//! Drowsy Drive - an interactive drowsy-driving PSA
//!
//! Core modules:
//! - `seq`: Deterministic playback sequencer (narrative player, message/game segments)
//! - `road`: Perspective road simulation and canvas rendering
//! - `script`: The PSA narrative as in-process configuration
//! - `audio`: Procedural Web Audio cues (wasm only)

pub mod road;
pub mod script;
pub mod seq;

#[cfg(target_arch = "wasm32")]
pub mod audio;

pub use road::{Road, RoadLine, Surface};
pub use seq::{FrameInput, Player, StageEvent};

/// Tuning constants
pub mod consts {
    /// Seed positions for the six lane markings (percent of lane progress)
    pub const LINE_SEEDS: [f32; 6] = [2.0, 9.0, 18.0, 32.0, 53.0, 79.0];
    /// Converts miles-per-hour into per-frame lane progress
    pub const SPEED_DIVISOR: f32 = 12.0;
    /// A fresh line is inserted once the nearest line has receded past this
    pub const GAP_THRESHOLD: f32 = 9.0;
    /// Lane progress where recycled lines reappear
    pub const RESPAWN_POSITION: f32 = 2.0;

    /// Road speed while narrative segments play (mph)
    pub const IDLE_SPEED_MPH: f32 = 10.0;

    // Perspective calibration, percent of canvas size.
    // Measured against the page art - calibration data, not derived.
    /// Horizontal midpoint of the lane
    pub const ROAD_MID_X: f32 = 50.05;
    /// Left lane edge at the vanishing end (lane progress 0)
    pub const ROAD_LEFT_X0: f32 = 49.95;
    /// Left lane edge at the near end (lane progress 100)
    pub const ROAD_LEFT_X1: f32 = 49.41;
    /// Vertical bounds of the lane
    pub const ROAD_Y0: f32 = 62.31;
    pub const ROAD_Y1: f32 = 100.0;

    /// Countdown seconds before a game session goes live
    pub const COUNTDOWN_SECONDS: u32 = 3;
    /// Fixed-tick road driver: tick period is `base / speed^2` ms
    pub const SPEED_TICK_BASE_MS: f64 = 60_000.0;

    // Microsleep dimmer shape (opacity oscillation on the scene element)
    pub const MICROSLEEP_MIN_OPACITY: f64 = 0.08;
    pub const MICROSLEEP_MAX_OPACITY: f64 = 1.0;
    pub const MICROSLEEP_TRANSITION_MS: f64 = 260.0;
    pub const MICROSLEEP_DELAY_MS: f64 = 420.0;
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
