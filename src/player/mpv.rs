//! mpv media engine
//!
//! Spawns mpv with a JSON IPC socket and drives it with `set_property`,
//! `seek` and `get_property` requests. One mpv process per session.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::{
    EngineError, EngineStatus, MediaEngine, MediaSession, PlaybackSample, SessionOptions,
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const IPC_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_RETRY: Duration = Duration::from_millis(50);

type Reply = Result<Value, String>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// Engine that plays each session in its own mpv window
pub struct MpvEngine {
    mpv_path: String,
}

impl MpvEngine {
    pub fn new() -> Self {
        Self::with_path("mpv")
    }

    /// Create with a custom mpv binary
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            mpv_path: path.into(),
        }
    }

    /// Check if mpv is available on the system
    pub async fn is_available(&self) -> bool {
        if self.mpv_path.contains('/') {
            return Path::new(&self.mpv_path).exists();
        }

        Command::new("which")
            .arg(&self.mpv_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self, media_link: &str, socket: &Path, options: SessionOptions) -> Command {
        let mut cmd = Command::new(&self.mpv_path);
        cmd.arg(media_link)
            .arg(format!("--input-ipc-server={}", socket.display()))
            .arg("--force-window=immediate")
            .arg("--keep-open=yes") // stay open at EOF so the end is observable
            .arg("--no-terminal")
            .arg("--osc=no");
        if !options.autoplay {
            cmd.arg("--pause");
        }
        if options.fullscreen {
            cmd.arg("--fs");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for MpvEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for MpvEngine {
    async fn prepare(
        &self,
        media_link: &str,
        options: SessionOptions,
    ) -> Result<Arc<dyn MediaSession>, EngineError> {
        let socket = std::env::temp_dir().join(format!("clipdeck-mpv-{}.sock", Uuid::new_v4()));

        let mut child = self
            .command(media_link, &socket, options)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::NotFound(self.mpv_path.clone())
                } else {
                    EngineError::StartFailed(e.to_string())
                }
            })?;
        info!(pid = child.id(), socket = %socket.display(), "spawned mpv");

        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        let stream = loop {
            match UnixStream::connect(&socket).await {
                Ok(stream) => break stream,
                Err(e) => {
                    if let Ok(Some(status)) = child.try_wait() {
                        warn!(%status, "mpv exited during startup");
                        return Err(EngineError::Exited);
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(EngineError::StartFailed(format!(
                            "IPC socket not ready: {}",
                            e
                        )));
                    }
                    tokio::time::sleep(CONNECT_RETRY).await;
                }
            }
        };

        Ok(Arc::new(MpvSession::attach(stream, socket, Some(child))))
    }
}

// =============================================================================
// Session
// =============================================================================

/// Live connection to one mpv process
pub struct MpvSession {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    released: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
    child: tokio::sync::Mutex<Option<Child>>,
    socket_path: PathBuf,
}

impl MpvSession {
    /// Wrap an already-connected IPC stream
    pub(crate) fn attach(stream: UnixStream, socket_path: PathBuf, child: Option<Child>) -> Self {
        let (read_half, write_half) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn({
            let pending = pending.clone();
            let closed = closed.clone();
            async move {
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    route_reply(&pending, &line);
                }
                debug!("mpv IPC stream closed");
                closed.store(true, Ordering::SeqCst);
                // Dropping the senders wakes every waiter with an error
                if let Ok(mut map) = pending.lock() {
                    map.clear();
                }
            }
        });

        Self {
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            released: AtomicBool::new(false),
            reader: Mutex::new(Some(reader)),
            child: tokio::sync::Mutex::new(child),
            socket_path,
        }
    }

    /// Send one IPC command and wait for its reply
    async fn request(&self, command: Value) -> Result<Value, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Exited);
        }

        let name = command
            .get(0)
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        if let Ok(mut map) = self.pending.lock() {
            map.insert(id, tx);
        }

        let mut line = json!({ "command": command, "request_id": id }).to_string();
        line.push('\n');
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                self.forget(id);
                return Err(EngineError::Ipc(e.to_string()));
            }
        }

        match tokio::time::timeout(IPC_TIMEOUT, rx).await {
            Err(_) => {
                self.forget(id);
                Err(EngineError::Ipc(format!("'{}' timed out", name)))
            }
            Ok(Err(_)) => Err(EngineError::Exited),
            Ok(Ok(Err(reason))) => Err(EngineError::Command {
                command: name,
                reason,
            }),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }

    fn forget(&self, id: u64) {
        if let Ok(mut map) = self.pending.lock() {
            map.remove(&id);
        }
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<(), EngineError> {
        self.request(json!(["set_property", name, value])).await?;
        Ok(())
    }

    /// Read a property; `None` while mpv reports it unavailable
    async fn get_property(&self, name: &str) -> Result<Option<Value>, EngineError> {
        match self.request(json!(["get_property", name])).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(EngineError::Command { reason, .. }) if reason == "property unavailable" => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_f64(&self, name: &str) -> Result<Option<f64>, EngineError> {
        Ok(self.get_property(name).await?.and_then(|v| v.as_f64()))
    }

    async fn get_bool(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self
            .get_property(name)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[async_trait]
impl MediaSession for MpvSession {
    async fn set_playing(&self, playing: bool) -> Result<(), EngineError> {
        self.set_property("pause", json!(!playing)).await
    }

    async fn seek(&self, position: Duration) -> Result<(), EngineError> {
        self.request(json!(["seek", position.as_secs_f64(), "absolute"]))
            .await?;
        Ok(())
    }

    async fn set_fullscreen(&self, fullscreen: bool) -> Result<(), EngineError> {
        self.set_property("fullscreen", json!(fullscreen)).await
    }

    async fn set_speed(&self, speed: f32) -> Result<(), EngineError> {
        self.set_property("speed", json!(speed)).await
    }

    async fn sample(&self) -> Result<PlaybackSample, EngineError> {
        let position = self.get_f64("time-pos").await?;
        let duration = self.get_f64("duration").await?;
        let paused = self.get_bool("pause").await?;
        let waiting = self.get_bool("paused-for-cache").await?;
        let eof = self.get_bool("eof-reached").await?;
        let cache_end = self.get_f64("demuxer-cache-time").await?;
        let speed = self.get_f64("speed").await?.unwrap_or(1.0);

        Ok(PlaybackSample {
            status: status_from(position.is_some(), waiting, eof),
            playing: !paused && !eof,
            position: secs(position),
            buffered: secs(cache_end),
            duration: duration.filter(|d| *d > 0.0).map(Duration::from_secs_f64),
            speed: speed as f32,
        })
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        if !self.closed.load(Ordering::SeqCst) {
            if let Err(e) = self.request(json!(["quit"])).await {
                debug!(error = %e, "mpv quit request failed");
            }
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(IPC_TIMEOUT, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("mpv did not quit, killing it");
                    let _ = child.kill().await;
                }
            }
        }

        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
        info!(socket = %self.socket_path.display(), "released mpv session");
    }
}

/// Deliver one IPC line to the request waiting on it; events are ignored
fn route_reply(pending: &Pending, line: &str) {
    let Ok(msg) = serde_json::from_str::<Value>(line) else {
        warn!(%line, "unparseable mpv IPC line");
        return;
    };
    let Some(id) = msg.get("request_id").and_then(Value::as_u64) else {
        return;
    };
    let Some(tx) = pending.lock().ok().and_then(|mut map| map.remove(&id)) else {
        return;
    };

    let reply = match msg.get("error").and_then(Value::as_str) {
        Some("success") | None => Ok(msg.get("data").cloned().unwrap_or(Value::Null)),
        Some(reason) => Err(reason.to_string()),
    };
    let _ = tx.send(reply);
}

fn status_from(has_position: bool, waiting_for_cache: bool, eof: bool) -> EngineStatus {
    if eof {
        EngineStatus::Ended
    } else if !has_position || waiting_for_cache {
        EngineStatus::Buffering
    } else {
        EngineStatus::Ready
    }
}

fn secs(value: Option<f64>) -> Duration {
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::ZERO)
}
