//! Local video cache backed by SQLite
//!
//! A single `videos` table keyed by catalog id holds the flattened
//! `VideoItem` fields. All SQLite work runs on the blocking pool.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::debug;

use crate::error::LocalError;
use crate::models::VideoItem;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS videos (
    id        INTEGER PRIMARY KEY NOT NULL,
    duration  INTEGER NOT NULL,
    title     TEXT NOT NULL,
    thumbnail TEXT NOT NULL,
    author    TEXT NOT NULL,
    quality   TEXT NOT NULL,
    link      TEXT NOT NULL
)";

/// Handle to the popular-videos cache; clones share one connection
#[derive(Clone)]
pub struct VideoCache {
    conn: Arc<Mutex<Connection>>,
}

impl VideoCache {
    /// Open (or create) the cache file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LocalError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LocalError::Storage(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened video cache");
        Self::with_connection(conn)
    }

    /// Cache that lives only as long as this handle (for tests)
    pub fn in_memory() -> Result<Self, LocalError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, LocalError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, LocalError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, LocalError> + Send + 'static,
    {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| LocalError::Storage("cache connection poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| LocalError::Storage(format!("task join error: {e}")))?
    }

    /// Insert or replace one row by id
    pub async fn upsert(&self, video: VideoItem) -> Result<(), LocalError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO videos (id, duration, title, thumbnail, author, quality, link)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    duration = excluded.duration,
                    title = excluded.title,
                    thumbnail = excluded.thumbnail,
                    author = excluded.author,
                    quality = excluded.quality,
                    link = excluded.link",
                params![
                    video.id as i64,
                    video.duration,
                    video.title,
                    video.thumbnail,
                    video.author,
                    video.quality,
                    video.link
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Every cached row, ordered by id
    pub async fn all(&self) -> Result<Vec<VideoItem>, LocalError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, duration, title, thumbnail, author, quality, link
                 FROM videos ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(VideoItem {
                    id: row.get::<_, i64>(0)? as u64,
                    duration: row.get(1)?,
                    title: row.get(2)?,
                    thumbnail: row.get(3)?,
                    author: row.get(4)?,
                    quality: row.get(5)?,
                    link: row.get(6)?,
                })
            })?;
            let items = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
        .await
    }

    /// Number of cached rows
    pub async fn len(&self) -> Result<usize, LocalError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |r| r.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    pub async fn is_empty(&self) -> Result<bool, LocalError> {
        Ok(self.len().await? == 0)
    }
}
