//! Deterministic playback sequencer.
//!
//! All narrative logic lives here. This module must stay pure and
//! deterministic:
//! - Time is passed in as milliseconds; deadlines live on one [`Scheduler`]
//! - Seeded RNG only
//! - Side effects leave as [`StageEvent`]s drained by the driver
//! - No rendering or platform dependencies

pub mod game;
pub mod message;
pub mod playable;
pub mod player;
pub mod schedule;

pub use game::{Game, GameConfig, GamePhase, error_percent};
pub use message::{Message, Panel, Span};
pub use playable::{Cue, DimParams, FrameInput, PlayContext, Playable, StageEvent};
pub use player::{Player, SequenceError};
pub use schedule::{CancelToken, Scheduler, TimerId};
