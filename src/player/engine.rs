//! Media engine abstraction
//!
//! The playback coordinator drives decoding and rendering through these
//! traits. `mpv` provides the real implementation; tests supply fakes.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from media engine operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),

    #[error("Failed to start player: {0}")]
    StartFailed(String),

    #[error("Player IPC failed: {0}")]
    Ipc(String),

    #[error("Player command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Player exited")]
    Exited,
}

/// Options applied when a session is prepared
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionOptions {
    /// Start playing as soon as the media is ready
    pub autoplay: bool,
    pub fullscreen: bool,
}

/// Coarse engine status reported with every sample
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    /// Waiting for data (initial preparation or stall)
    Buffering,
    /// Media loaded; playing or paused
    Ready,
    /// Reached the end of the stream
    Ended,
    /// Unrecoverable playback failure
    Failed(String),
}

/// Point-in-time reading of a media session
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSample {
    pub status: EngineStatus,
    pub playing: bool,
    pub position: Duration,
    /// Absolute position up to which media is buffered
    pub buffered: Duration,
    /// `None` until the engine knows the length
    pub duration: Option<Duration>,
    pub speed: f32,
}

impl PlaybackSample {
    /// Whether the session is moving (or trying to)
    pub fn is_active(&self) -> bool {
        self.playing || self.status == EngineStatus::Buffering
    }
}

/// Creates media sessions bound to a media link
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn prepare(
        &self,
        media_link: &str,
        options: SessionOptions,
    ) -> Result<Arc<dyn MediaSession>, EngineError>;
}

/// One prepared media item
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn set_playing(&self, playing: bool) -> Result<(), EngineError>;

    async fn seek(&self, position: Duration) -> Result<(), EngineError>;

    async fn set_fullscreen(&self, fullscreen: bool) -> Result<(), EngineError>;

    async fn set_speed(&self, speed: f32) -> Result<(), EngineError>;

    async fn sample(&self) -> Result<PlaybackSample, EngineError>;

    /// Stop playback and free engine resources; safe to call twice
    async fn release(&self);
}
