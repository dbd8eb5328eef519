//! Playback state record and actions
//!
//! `PlayerState` is owned by the coordinator task and published as a snapshot
//! after every change. The helpers here are pure so the arithmetic can be
//! tested without an engine.

use serde::Serialize;
use std::time::Duration;

use super::engine::{EngineStatus, PlaybackSample};
use crate::models::{format_clock, VideoInfo, VideoItem};

/// Slowest supported playback rate
pub const MIN_SPEED: f32 = 0.25;
/// Fastest supported playback rate
pub const MAX_SPEED: f32 = 4.0;

/// Where the coordinator is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    #[default]
    Idle,
    /// Fetching video detail
    Loading,
    /// Session exists but media is not ready
    Buffering,
    Ready,
    Failed,
    /// Torn down; no further transitions
    Released,
}

/// Discrete user intents accepted by the playback coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    Open(u64),
    PlayPause,
    ToggleControls,
    ToggleLock,
    /// Seek to a fraction of the total duration
    SeekTo(f32),
    SeekBySeconds(i64),
    EnterFullscreen,
    ExitFullscreen,
    ToggleFullscreen,
    SetSpeed(f32),
    Retry,
    Back,
}

/// Snapshot of everything the presentation layer shows during playback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub phase: PlaybackPhase,
    pub is_loading: bool,
    pub is_buffering: bool,
    pub error_message: Option<String>,
    pub video: Option<VideoInfo>,
    pub is_playing: bool,
    /// Reached the end of the stream
    pub is_ended: bool,
    pub is_fullscreen: bool,
    pub show_controls: bool,
    pub is_controls_locked: bool,
    /// Position as a fraction of the total, in [0, 1]
    pub progress: f32,
    /// Buffered position as a fraction of the total, in [0, 1]
    pub buffered: f32,
    pub total_duration: Duration,
    pub current_time: Duration,
    pub playback_speed: f32,
    pub related: Vec<VideoItem>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            is_loading: false,
            is_buffering: false,
            error_message: None,
            video: None,
            is_playing: false,
            is_ended: false,
            is_fullscreen: false,
            show_controls: true,
            is_controls_locked: false,
            progress: 0.0,
            buffered: 0.0,
            total_duration: Duration::ZERO,
            current_time: Duration::ZERO,
            playback_speed: 1.0,
            related: Vec::new(),
        }
    }
}

impl PlayerState {
    /// Move to `phase`, keeping the derived flags consistent
    pub fn set_phase(&mut self, phase: PlaybackPhase) {
        self.phase = phase;
        self.is_loading = phase == PlaybackPhase::Loading;
        self.is_buffering = phase == PlaybackPhase::Buffering;
        if phase != PlaybackPhase::Failed {
            self.error_message = None;
        }
        if phase == PlaybackPhase::Loading {
            self.is_ended = false;
        }
        if matches!(
            phase,
            PlaybackPhase::Loading | PlaybackPhase::Failed | PlaybackPhase::Released
        ) {
            self.is_playing = false;
        }
    }

    /// Enter the Failed phase with a user-facing message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.set_phase(PlaybackPhase::Failed);
        self.error_message = Some(message.into());
    }

    /// Forget the current video and its position
    pub fn clear_media(&mut self) {
        self.video = None;
        self.is_ended = false;
        self.progress = 0.0;
        self.buffered = 0.0;
        self.total_duration = Duration::ZERO;
        self.current_time = Duration::ZERO;
    }

    /// Whether transport commands can reach a session
    pub fn accepts_transport(&self) -> bool {
        matches!(self.phase, PlaybackPhase::Buffering | PlaybackPhase::Ready)
    }

    /// Whether the total duration has been reported
    pub fn has_duration(&self) -> bool {
        !self.total_duration.is_zero()
    }

    /// `MM:SS / MM:SS` position readout
    pub fn clock(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.current_time),
            format_clock(self.total_duration)
        )
    }

    /// Fold an engine sample into the state
    ///
    /// Returns `true` when the stream just reached its end.
    pub fn apply_sample(&mut self, sample: &PlaybackSample) -> bool {
        match &sample.status {
            EngineStatus::Buffering => self.set_phase(PlaybackPhase::Buffering),
            EngineStatus::Ready | EngineStatus::Ended => self.set_phase(PlaybackPhase::Ready),
            EngineStatus::Failed(reason) => {
                self.fail(format!("Playback failed: {}", reason));
                return false;
            }
        }

        if let Some(total) = sample.duration.filter(|d| !d.is_zero()) {
            self.total_duration = total;
        }
        self.current_time = if self.has_duration() {
            sample.position.min(self.total_duration)
        } else {
            sample.position
        };
        self.progress = fraction(self.current_time, self.total_duration);
        self.buffered = fraction(sample.buffered, self.total_duration);
        self.playback_speed = clamp_speed(sample.speed);

        let ended = sample.status == EngineStatus::Ended;
        let just_ended = ended && !self.is_ended;
        self.is_ended = ended;
        self.is_playing = sample.playing && !ended;
        just_ended
    }
}

/// `part / whole` clamped to [0, 1]; zero when `whole` is unknown
pub fn fraction(part: Duration, whole: Duration) -> f32 {
    if whole.is_zero() {
        return 0.0;
    }
    (part.as_secs_f64() / whole.as_secs_f64()).clamp(0.0, 1.0) as f32
}

/// Position for a seek to `fraction` of `total`, rounded to the millisecond
pub fn seek_position(total: Duration, fraction: f32) -> Duration {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0) as f64
    };
    let millis = (total.as_millis() as f64 * fraction).round();
    Duration::from_millis(millis as u64)
}

/// `current + delta_secs`, clamped to [0, total]
pub fn offset_position(current: Duration, delta_secs: i64, total: Duration) -> Duration {
    let delta = Duration::from_secs(delta_secs.unsigned_abs());
    let moved = if delta_secs < 0 {
        current.saturating_sub(delta)
    } else {
        current.saturating_add(delta)
    };
    moved.min(total)
}

/// Clamp a requested rate to the supported range
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        return 1.0;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}
