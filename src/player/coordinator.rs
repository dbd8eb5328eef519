//! Playback coordinator
//!
//! A tokio task that owns one `PlayerState`. Handles send it commands over an
//! unbounded channel; it applies them in order and publishes a snapshot on a
//! `watch` channel after each one. Fetches, media preparation, polling and the
//! controls timer run in spawned tasks holding weak senders, and tag their
//! reports with the generation (or timer token) they were started under so
//! stale reports are dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::engine::{EngineError, EngineStatus, MediaEngine, MediaSession, PlaybackSample, SessionOptions};
use super::state::{
    clamp_speed, fraction, offset_position, seek_position, PlaybackPhase, PlayerAction,
    PlayerState,
};
use crate::error::DataError;
use crate::models::{VideoInfo, VideoItem};
use crate::repository::VideoRepository;

/// Timing and startup behaviour of a coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub poll_interval: Duration,
    /// Quiet period before visible controls hide themselves
    pub controls_hide_delay: Duration,
    /// Start playing as soon as media is prepared
    pub autoplay: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            controls_hide_delay: Duration::from_secs(3),
            autoplay: false,
        }
    }
}

enum Command {
    Action(PlayerAction),
    InfoLoaded {
        generation: u64,
        result: Result<VideoInfo, DataError>,
    },
    RelatedLoaded(Result<Vec<VideoItem>, DataError>),
    SessionPrepared {
        generation: u64,
        result: Result<Arc<dyn MediaSession>, EngineError>,
    },
    Sampled {
        generation: u64,
        result: Result<PlaybackSample, EngineError>,
    },
    HideControls {
        token: u64,
    },
    Release(oneshot::Sender<()>),
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to a running playback coordinator
///
/// Clones share the coordinator. Dropping the last clone tears it down.
#[derive(Clone)]
pub struct PlayerCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PlayerState>,
}

impl PlayerCoordinator {
    /// Start a coordinator task on the current runtime
    pub fn spawn(
        repository: Arc<dyn VideoRepository>,
        engine: Arc<dyn MediaEngine>,
        config: PlayerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (publisher, state) = watch::channel(PlayerState::default());

        let actor = Actor {
            repository,
            engine,
            config,
            state: PlayerState::default(),
            publisher,
            tx: tx.downgrade(),
            session: None,
            generation: 0,
            last_id: None,
            related_requested: false,
            hide_token: 0,
            fetch_task: None,
            prepare_task: None,
            poll_task: None,
            hide_task: None,
            released: false,
        };
        tokio::spawn(actor.run(rx));

        Self { tx, state }
    }

    pub fn dispatch(&self, action: PlayerAction) {
        if self.tx.send(Command::Action(action)).is_err() {
            debug!("player coordinator is gone, action dropped");
        }
    }

    pub fn open(&self, id: u64) {
        self.dispatch(PlayerAction::Open(id));
    }

    pub fn toggle_play_pause(&self) {
        self.dispatch(PlayerAction::PlayPause);
    }

    /// Seek to `fraction` of the total duration
    pub fn seek_to(&self, fraction: f32) {
        self.dispatch(PlayerAction::SeekTo(fraction));
    }

    pub fn seek_by_seconds(&self, delta: i64) {
        self.dispatch(PlayerAction::SeekBySeconds(delta));
    }

    pub fn toggle_controls(&self) {
        self.dispatch(PlayerAction::ToggleControls);
    }

    pub fn toggle_controls_lock(&self) {
        self.dispatch(PlayerAction::ToggleLock);
    }

    pub fn enter_fullscreen(&self) {
        self.dispatch(PlayerAction::EnterFullscreen);
    }

    pub fn exit_fullscreen(&self) {
        self.dispatch(PlayerAction::ExitFullscreen);
    }

    pub fn toggle_fullscreen(&self) {
        self.dispatch(PlayerAction::ToggleFullscreen);
    }

    pub fn set_speed(&self, speed: f32) {
        self.dispatch(PlayerAction::SetSpeed(speed));
    }

    pub fn retry(&self) {
        self.dispatch(PlayerAction::Retry);
    }

    /// Latest published state
    pub fn state(&self) -> PlayerState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.state.clone()
    }

    /// Tear down and wait until the media session is released
    pub async fn release(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Release(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

struct Actor {
    repository: Arc<dyn VideoRepository>,
    engine: Arc<dyn MediaEngine>,
    config: PlayerConfig,
    state: PlayerState,
    publisher: watch::Sender<PlayerState>,
    tx: mpsc::WeakUnboundedSender<Command>,
    session: Option<Arc<dyn MediaSession>>,
    /// Bumped by every open; reports from older opens are ignored
    generation: u64,
    last_id: Option<u64>,
    related_requested: bool,
    /// Bumped whenever the controls timer is restarted or cancelled
    hide_token: u64,
    fetch_task: Option<JoinHandle<()>>,
    prepare_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    hide_task: Option<JoinHandle<()>>,
    released: bool,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            let keep_running = self.handle(command).await;
            self.publish();
            if !keep_running {
                break;
            }
        }
        self.teardown().await;
    }

    async fn handle(&mut self, command: Command) -> bool {
        if self.released {
            if let Command::Release(ack) = command {
                let _ = ack.send(());
            }
            return false;
        }

        match command {
            Command::Action(PlayerAction::Back) => {
                self.teardown().await;
                return false;
            }
            Command::Action(action) => self.apply(action).await,
            Command::InfoLoaded { generation, result } => {
                if generation == self.generation {
                    self.on_info(result).await;
                }
            }
            Command::RelatedLoaded(result) => match result {
                Ok(videos) => self.state.related = videos,
                Err(e) => warn!(error = %e, "failed to load related videos"),
            },
            Command::SessionPrepared { generation, result } => {
                self.on_session(generation, result).await;
            }
            Command::Sampled { generation, result } => {
                if generation == self.generation && self.session.is_some() {
                    self.on_sample(result).await;
                }
            }
            Command::HideControls { token } => {
                if token == self.hide_token && !self.state.is_controls_locked {
                    self.state.show_controls = false;
                }
            }
            Command::Release(ack) => {
                self.teardown().await;
                let _ = ack.send(());
                return false;
            }
        }
        true
    }

    async fn apply(&mut self, action: PlayerAction) {
        debug!(?action, "player action");
        match action {
            PlayerAction::Open(id) => self.open(id),
            PlayerAction::Retry => {
                if let Some(id) = self.last_id {
                    self.state.error_message = None;
                    self.open(id);
                }
            }
            PlayerAction::PlayPause => self.toggle_play_pause().await,
            PlayerAction::SeekTo(f) => self.seek_to(f).await,
            PlayerAction::SeekBySeconds(delta) => self.seek_by_seconds(delta).await,
            PlayerAction::ToggleControls => {
                if self.state.show_controls {
                    self.state.show_controls = false;
                    self.cancel_hide_timer();
                } else {
                    self.reveal_controls();
                }
            }
            PlayerAction::ToggleLock => {
                self.state.is_controls_locked = !self.state.is_controls_locked;
                if self.state.is_controls_locked {
                    self.state.show_controls = true;
                    self.cancel_hide_timer();
                } else {
                    self.restart_hide_timer();
                }
            }
            PlayerAction::EnterFullscreen => self.set_fullscreen(true).await,
            PlayerAction::ExitFullscreen => self.set_fullscreen(false).await,
            PlayerAction::ToggleFullscreen => {
                let fullscreen = !self.state.is_fullscreen;
                self.set_fullscreen(fullscreen).await;
            }
            PlayerAction::SetSpeed(speed) => self.set_speed(speed).await,
            PlayerAction::Back => {}
        }
    }

    fn publish(&self) {
        let state = &self.state;
        self.publisher.send_if_modified(|published| {
            if published == state {
                false
            } else {
                *published = state.clone();
                true
            }
        });
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    fn open(&mut self, id: u64) {
        info!(id, "opening video");
        self.generation += 1;
        self.last_id = Some(id);
        abort(&mut self.fetch_task);
        abort(&mut self.prepare_task);
        abort(&mut self.poll_task);
        self.state.set_phase(PlaybackPhase::Loading);

        let repository = self.repository.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        self.fetch_task = Some(tokio::spawn(async move {
            let result = repository.video_info(id).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::InfoLoaded { generation, result });
            }
        }));

        if !self.related_requested {
            self.related_requested = true;
            let repository = self.repository.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let result = repository.popular_videos().await;
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Command::RelatedLoaded(result));
                }
            });
        }
    }

    async fn on_info(&mut self, result: Result<VideoInfo, DataError>) {
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "failed to load video detail");
                self.release_session().await;
                self.state.clear_media();
                self.state.fail(e.user_message());
                return;
            }
        };

        self.release_session().await;
        let media_link = info.media_link.clone();
        self.state.total_duration = Duration::from_secs(u64::from(info.duration_secs));
        self.state.current_time = Duration::ZERO;
        self.state.progress = 0.0;
        self.state.buffered = 0.0;
        self.state.video = Some(info);
        self.state.set_phase(PlaybackPhase::Buffering);

        let engine = self.engine.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        let options = SessionOptions {
            autoplay: self.config.autoplay,
            fullscreen: self.state.is_fullscreen,
        };
        self.prepare_task = Some(tokio::spawn(async move {
            let result = engine.prepare(&media_link, options).await;
            let session = result.as_ref().ok().cloned();
            let delivered = match tx.upgrade() {
                Some(tx) => tx
                    .send(Command::SessionPrepared { generation, result })
                    .is_ok(),
                None => false,
            };
            if !delivered {
                if let Some(session) = session {
                    session.release().await;
                }
            }
        }));
    }

    async fn on_session(
        &mut self,
        generation: u64,
        result: Result<Arc<dyn MediaSession>, EngineError>,
    ) {
        if generation != self.generation {
            if let Ok(session) = result {
                debug!("releasing session from a superseded open");
                session.release().await;
            }
            return;
        }

        match result {
            Ok(session) => {
                info!("media session ready");
                let speed = self.state.playback_speed;
                if (speed - 1.0).abs() > f32::EPSILON {
                    if let Err(e) = session.set_speed(speed).await {
                        warn!(error = %e, "failed to restore playback speed");
                    }
                }
                self.session = Some(session.clone());
                self.state.is_playing = self.config.autoplay;
                self.start_polling(session);
                self.reveal_controls();
            }
            Err(e) => {
                warn!(error = %e, "failed to prepare media");
                self.state.fail(format!("Playback failed: {}", e));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Polling
    // -------------------------------------------------------------------------

    fn start_polling(&mut self, session: Arc<dyn MediaSession>) {
        abort(&mut self.poll_task);
        let tx = self.tx.clone();
        let generation = self.generation;
        let period = self.config.poll_interval;

        self.poll_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<PlaybackSample> = None;

            loop {
                ticker.tick().await;
                let result = session.sample().await;
                let (publish, stop) = match &result {
                    Ok(sample) => (
                        sample.is_active() || last.as_ref() != Some(sample),
                        matches!(sample.status, EngineStatus::Failed(_)),
                    ),
                    Err(_) => (true, true),
                };
                if let Ok(sample) = &result {
                    last = Some(sample.clone());
                }

                if publish {
                    let Some(tx) = tx.upgrade() else { break };
                    if tx.send(Command::Sampled { generation, result }).is_err() {
                        break;
                    }
                }
                if stop {
                    break;
                }
            }
        }));
    }

    async fn on_sample(&mut self, result: Result<PlaybackSample, EngineError>) {
        match result {
            Ok(sample) => {
                let ended = self.state.apply_sample(&sample);
                if self.state.phase == PlaybackPhase::Failed {
                    warn!(?sample.status, "engine reported failure");
                    self.release_session().await;
                } else if ended {
                    debug!("end of stream");
                    self.state.show_controls = true;
                    self.cancel_hide_timer();
                }
            }
            Err(e) => {
                warn!(error = %e, "sampling the engine failed");
                self.state.fail(format!("Playback failed: {}", e));
                self.release_session().await;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    /// The session, unless a load or failure has taken it out of play
    fn transport_session(&self) -> Option<Arc<dyn MediaSession>> {
        if self.state.accepts_transport() {
            self.session.clone()
        } else {
            None
        }
    }

    async fn toggle_play_pause(&mut self) {
        let Some(session) = self.transport_session() else {
            return;
        };
        let playing = !self.state.is_playing;

        if playing && self.state.is_ended {
            if let Err(e) = session.seek(Duration::ZERO).await {
                warn!(error = %e, "failed to rewind");
            }
            self.state.is_ended = false;
            self.state.current_time = Duration::ZERO;
            self.state.progress = 0.0;
        }

        match session.set_playing(playing).await {
            Ok(()) => self.state.is_playing = playing,
            Err(e) => warn!(error = %e, playing, "failed to toggle playback"),
        }
        self.reveal_controls();
    }

    async fn seek_to(&mut self, fraction: f32) {
        let Some(session) = self.transport_session() else {
            return;
        };
        if !self.state.has_duration() {
            return;
        }

        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let position = seek_position(self.state.total_duration, fraction);
        if let Err(e) = session.seek(position).await {
            warn!(error = %e, "seek failed");
        }
        self.state.current_time = position;
        self.state.progress = fraction;
        self.state.is_ended = false;
        self.reveal_controls();
    }

    async fn seek_by_seconds(&mut self, delta: i64) {
        let Some(session) = self.transport_session() else {
            return;
        };
        if !self.state.has_duration() {
            return;
        }

        let total = self.state.total_duration;
        let position = offset_position(self.state.current_time, delta, total);
        if let Err(e) = session.seek(position).await {
            warn!(error = %e, "seek failed");
        }
        self.state.current_time = position;
        self.state.progress = fraction(position, total);
        self.state.is_ended = false;
        self.reveal_controls();
    }

    async fn set_fullscreen(&mut self, fullscreen: bool) {
        self.state.is_fullscreen = fullscreen;
        if let Some(session) = self.session.clone() {
            if let Err(e) = session.set_fullscreen(fullscreen).await {
                warn!(error = %e, fullscreen, "failed to switch fullscreen");
            }
        }

        if fullscreen {
            self.state.show_controls = false;
            self.restart_hide_timer();
        } else {
            self.reveal_controls();
        }
    }

    async fn set_speed(&mut self, speed: f32) {
        let speed = clamp_speed(speed);
        self.state.playback_speed = speed;
        if let Some(session) = self.session.clone() {
            if let Err(e) = session.set_speed(speed).await {
                warn!(error = %e, speed, "failed to change speed");
            }
        }
        self.reveal_controls();
    }

    // -------------------------------------------------------------------------
    // Controls timer
    // -------------------------------------------------------------------------

    fn reveal_controls(&mut self) {
        self.state.show_controls = true;
        self.restart_hide_timer();
    }

    fn restart_hide_timer(&mut self) {
        self.cancel_hide_timer();
        if self.state.is_controls_locked {
            return;
        }

        let tx = self.tx.clone();
        let token = self.hide_token;
        let delay = self.config.controls_hide_delay;
        self.hide_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::HideControls { token });
            }
        }));
    }

    fn cancel_hide_timer(&mut self) {
        self.hide_token += 1;
        abort(&mut self.hide_task);
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    async fn release_session(&mut self) {
        abort(&mut self.poll_task);
        if let Some(session) = self.session.take() {
            session.release().await;
        }
    }

    async fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.generation += 1;

        abort(&mut self.fetch_task);
        abort(&mut self.prepare_task);
        self.cancel_hide_timer();
        self.release_session().await;

        self.state.set_phase(PlaybackPhase::Released);
        self.publisher.send_replace(self.state.clone());
        info!("player released");
    }
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}
