//! Video playback
//!
//! - `engine`: media engine traits the coordinator drives
//! - `mpv`: engine backed by an mpv process (Unix only)
//! - `state`: the published `PlayerState` and its actions
//! - `coordinator`: the task that owns the state

pub mod coordinator;
pub mod engine;
#[cfg(unix)]
pub mod mpv;
pub mod state;

pub use coordinator::{PlayerConfig, PlayerCoordinator};
pub use engine::{
    EngineError, EngineStatus, MediaEngine, MediaSession, PlaybackSample, SessionOptions,
};
#[cfg(unix)]
pub use mpv::MpvEngine;
pub use state::{PlaybackPhase, PlayerAction, PlayerState};
