//! CLI Command Handlers
//!
//! Each handler takes its CLI args, the loaded config and Output, and returns
//! an ExitCode. Listing commands go through the list coordinator and `play`
//! drives the playback coordinator from the keyboard.

use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::terminal;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::api::PexelsClient;
use crate::cache::VideoCache;
use crate::cli::{
    key_to_command, CachedCmd, ExitCode, InfoCmd, KeyCommand, Output, PlayCmd, PopularCmd,
    SearchCmd,
};
use crate::config::Config;
use crate::list::{ListCoordinator, ListState};
use crate::models::VideoItem;
use crate::player::{PlaybackPhase, PlayerCoordinator, PlayerState};
use crate::repository::{DefaultVideoRepository, VideoRepository};

const PROGRESS_WIDTH: usize = 20;
const KEY_POLL: Duration = Duration::from_millis(100);

// =============================================================================
// Setup
// =============================================================================

fn open_repository(
    config: &Config,
    output: &Output,
) -> Result<Arc<DefaultVideoRepository>, ExitCode> {
    let api_key = config
        .api_key()
        .map_err(|e| output.error(e.to_string(), ExitCode::InvalidArgs))?;

    let client = match &config.base_url {
        Some(url) => PexelsClient::with_base_url(api_key, url),
        None => PexelsClient::new(api_key),
    };

    let cache_path = config
        .cache_path()
        .map_err(|e| output.error(e.to_string(), ExitCode::CacheError))?;
    let cache = VideoCache::open(&cache_path).map_err(|e| {
        output.error(
            format!("Could not open cache {}: {}", cache_path.display(), e),
            ExitCode::CacheError,
        )
    })?;

    Ok(Arc::new(
        DefaultVideoRepository::new(Arc::new(client), cache).with_page_size(config.page_size()),
    ))
}

/// Wait for the next published change, then until the list is idle
async fn wait_until_idle(rx: &mut watch::Receiver<ListState>) -> ListState {
    if rx.changed().await.is_err() {
        return rx.borrow().clone();
    }
    let idle = match rx.wait_for(|state| !state.is_busy()).await {
        Ok(state) => Some(state.clone()),
        Err(_) => None,
    };
    idle.unwrap_or_else(|| rx.borrow().clone())
}

fn print_videos(mut videos: Vec<VideoItem>, limit: Option<usize>, output: &Output) -> ExitCode {
    if let Some(limit) = limit {
        videos.truncate(limit);
    }

    let printed = output.print(&videos, |videos| {
        if videos.is_empty() {
            return "No videos found.".to_string();
        }
        videos
            .iter()
            .map(|v| format!("{:>10}  {}", v.id, v))
            .collect::<Vec<_>>()
            .join("\n")
    });
    if let Err(e) = printed {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Popular Command
// =============================================================================

pub async fn popular_cmd(cmd: PopularCmd, config: &Config, output: &Output) -> ExitCode {
    let repository = match open_repository(config, output) {
        Ok(repo) => repo,
        Err(code) => return code,
    };

    let list = ListCoordinator::spawn(repository, config.list_config());
    let mut rx = list.subscribe();
    if cmd.refresh {
        output.info("Refreshing popular videos...");
        list.refresh();
    } else {
        list.load_popular();
    }

    let state = wait_until_idle(&mut rx).await;
    if let Some(err) = &state.error {
        return output.error(err.user_message(), ExitCode::from(err));
    }
    print_videos(state.top_videos, cmd.limit, output)
}

// =============================================================================
// Search Command
// =============================================================================

pub async fn search_cmd(cmd: SearchCmd, config: &Config, output: &Output) -> ExitCode {
    if cmd.query.trim().is_empty() {
        return output.error("Search query is empty", ExitCode::InvalidArgs);
    }
    let repository = match open_repository(config, output) {
        Ok(repo) => repo,
        Err(code) => return code,
    };

    output.info(format!("Searching for: {}", cmd.query));
    let list = ListCoordinator::spawn(repository, config.list_config());
    let mut rx = list.subscribe();
    list.search(cmd.query);

    let state = wait_until_idle(&mut rx).await;
    if let Some(err) = &state.error {
        return output.error(err.user_message(), ExitCode::from(err));
    }
    print_videos(state.search_results, cmd.limit, output)
}

// =============================================================================
// Info Command
// =============================================================================

pub async fn info_cmd(cmd: InfoCmd, config: &Config, output: &Output) -> ExitCode {
    let repository = match open_repository(config, output) {
        Ok(repo) => repo,
        Err(code) => return code,
    };

    match repository.video_info(cmd.id).await {
        Ok(info) => {
            let printed = output.print(&info, |info| {
                format!(
                    "{}\n  by {}\n  {} {}\n  media: {}\n  page:  {}",
                    info.title, info.author, info.duration, info.quality, info.media_link, info.link
                )
            });
            if let Err(e) = printed {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.error(e.user_message(), ExitCode::from(&e)),
    }
}

// =============================================================================
// Cached Command
// =============================================================================

pub async fn cached_cmd(_cmd: CachedCmd, config: &Config, output: &Output) -> ExitCode {
    let cache_path = match config.cache_path() {
        Ok(path) => path,
        Err(e) => return output.error(e.to_string(), ExitCode::CacheError),
    };
    if !cache_path.exists() {
        return print_videos(Vec::new(), None, output);
    }

    let cache = match VideoCache::open(&cache_path) {
        Ok(cache) => cache,
        Err(e) => return output.error(e.to_string(), ExitCode::CacheError),
    };
    match cache.all().await {
        Ok(videos) => print_videos(videos, None, output),
        Err(e) => output.error(e.to_string(), ExitCode::CacheError),
    }
}

// =============================================================================
// Play Command
// =============================================================================

/// Restores cooked mode when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Read key presses on the blocking pool until the receiver goes away
fn spawn_key_reader(tx: mpsc::UnboundedSender<KeyEvent>) {
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(KEY_POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if tx.send(key).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "failed to read terminal event");
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "failed to poll terminal");
                    break;
                }
            }
        }
    });
}

/// One-line rendering of the player state
pub fn status_line(state: &PlayerState) -> String {
    let title = state
        .video
        .as_ref()
        .map(|v| v.title.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled");

    match state.phase {
        PlaybackPhase::Idle => return "Idle".to_string(),
        PlaybackPhase::Loading => return "Loading...".to_string(),
        PlaybackPhase::Released => return "Stopped".to_string(),
        PlaybackPhase::Failed => {
            return format!(
                "{} (r to retry)",
                state.error_message.as_deref().unwrap_or("Playback failed")
            )
        }
        PlaybackPhase::Buffering | PlaybackPhase::Ready => {}
    }

    let icon = if state.is_buffering {
        "…"
    } else if state.is_playing {
        "▶"
    } else {
        "⏸"
    };

    let mut line = format!("{} {}", icon, title);
    if state.show_controls {
        let filled = (state.progress * PROGRESS_WIDTH as f32).round() as usize;
        let filled = filled.min(PROGRESS_WIDTH);
        line.push_str(&format!(
            "  {} [{}{}] {:.2}x",
            state.clock(),
            "#".repeat(filled),
            "-".repeat(PROGRESS_WIDTH - filled),
            state.playback_speed
        ));
    }
    if state.is_controls_locked {
        line.push_str(" [locked]");
    }
    if state.is_fullscreen {
        line.push_str(" [fullscreen]");
    }
    line
}

fn render(state: &PlayerState) {
    let mut err = std::io::stderr();
    let _ = write!(err, "\r\x1b[2K{}", status_line(state));
    let _ = err.flush();
}

#[cfg(not(unix))]
pub async fn play_cmd(_cmd: PlayCmd, _config: &Config, output: &Output) -> ExitCode {
    output.error(
        "Playback drives mpv over a Unix socket and is not supported on this platform",
        ExitCode::PlaybackFailed,
    )
}

#[cfg(unix)]
pub async fn play_cmd(cmd: PlayCmd, config: &Config, output: &Output) -> ExitCode {
    if !std::io::stdin().is_terminal() {
        return output.error("play needs an interactive terminal", ExitCode::InvalidArgs);
    }

    let engine = crate::player::MpvEngine::with_path(config.mpv_path());
    if !engine.is_available().await {
        return output.error(
            format!("Player '{}' not found. Install mpv first.", config.mpv_path()),
            ExitCode::PlaybackFailed,
        );
    }

    let repository = match open_repository(config, output) {
        Ok(repo) => repo,
        Err(code) => return code,
    };

    let mut player_config = config.player_config();
    player_config.autoplay = !cmd.paused;
    let player = PlayerCoordinator::spawn(repository, Arc::new(engine), player_config);
    let mut states = player.subscribe();
    if cmd.fullscreen {
        player.enter_fullscreen();
    }
    player.open(cmd.id);
    info!(id = cmd.id, "interactive playback started");

    let guard = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(e) => {
            player.release().await;
            return output.error(format!("Terminal error: {}", e), ExitCode::Error);
        }
    };
    let (key_tx, mut keys) = mpsc::unbounded_channel();
    spawn_key_reader(key_tx);

    let interactive = !output.quiet && !output.json;
    loop {
        tokio::select! {
            key = keys.recv() => {
                let Some(key) = key else { break };
                match key_to_command(key) {
                    Some(KeyCommand::Quit) => break,
                    Some(KeyCommand::Player(action)) => player.dispatch(action),
                    Some(KeyCommand::SpeedStep(step)) => {
                        player.set_speed(player.state().playback_speed + step);
                    }
                    None => {}
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                if interactive {
                    render(&states.borrow_and_update());
                }
            }
        }
    }

    let last = player.state();
    player.release().await;
    drop(keys);
    drop(guard);
    if interactive {
        eprintln!();
    }

    if last.phase == PlaybackPhase::Failed {
        let msg = last
            .error_message
            .unwrap_or_else(|| "Playback failed".to_string());
        return output.error(msg, ExitCode::PlaybackFailed);
    }
    if output.json {
        if let Err(e) = output.print(&last, |_| String::new()) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoInfo;

    #[tokio::test]
    async fn test_wait_until_idle_skips_busy_states() {
        let (tx, mut rx) = watch::channel(ListState::default());
        let writer = tokio::spawn(async move {
            tx.send_modify(|s| s.is_loading = true);
            tokio::task::yield_now().await;
            tx.send_modify(|s| {
                s.is_loading = false;
                s.query = "done".into();
            });
            tx
        });

        let state = wait_until_idle(&mut rx).await;
        assert!(!state.is_busy());
        assert_eq!(state.query, "done");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_until_idle_returns_last_state_when_closed() {
        let (tx, mut rx) = watch::channel(ListState::default());
        tx.send_modify(|s| {
            s.is_searching = true;
            s.query = "cats".into();
        });
        drop(tx);

        let state = wait_until_idle(&mut rx).await;
        assert!(state.is_searching);
        assert_eq!(state.query, "cats");
    }

    fn info() -> VideoInfo {
        VideoInfo {
            id: 1,
            title: "Waves".into(),
            author: "Ann".into(),
            quality: "HD".into(),
            media_link: "https://videos.example/1.mp4".into(),
            link: "https://www.pexels.com/video/waves-1/".into(),
            thumbnail: String::new(),
            duration: "00:40".into(),
            duration_secs: 40,
        }
    }

    #[test]
    fn test_status_line_ready() {
        let mut state = PlayerState {
            video: Some(info()),
            total_duration: Duration::from_secs(40),
            current_time: Duration::from_secs(20),
            progress: 0.5,
            is_playing: true,
            ..PlayerState::default()
        };
        state.set_phase(PlaybackPhase::Ready);

        let line = status_line(&state);
        assert!(line.starts_with("▶ Waves"));
        assert!(line.contains("00:20 / 00:40"));
        assert!(line.contains(&format!("[{}{}]", "#".repeat(10), "-".repeat(10))));
        assert!(line.contains("1.00x"));
    }

    #[test]
    fn test_status_line_hidden_controls() {
        let mut state = PlayerState {
            video: Some(info()),
            show_controls: false,
            is_controls_locked: false,
            ..PlayerState::default()
        };
        state.set_phase(PlaybackPhase::Ready);
        assert_eq!(status_line(&state), "⏸ Waves");
    }

    #[test]
    fn test_status_line_failed() {
        let mut state = PlayerState::default();
        state.fail("Couldn't reach the server.");
        assert_eq!(
            status_line(&state),
            "Couldn't reach the server. (r to retry)"
        );
    }
}
