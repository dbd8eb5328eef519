//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clipdeck::api::CatalogSource;
use clipdeck::cache::VideoCache;
use clipdeck::error::RemoteError;
use clipdeck::models::{format_mmss, VideoInfo, VideoItem};
use clipdeck::repository::DefaultVideoRepository;

pub const CLIP_SECS: u32 = 40;

pub fn item(id: u64) -> VideoItem {
    VideoItem {
        id,
        title: format!("Video {id}"),
        duration: CLIP_SECS,
        thumbnail: format!("https://images.pexels.com/{id}.jpg"),
        author: "Ann".into(),
        quality: "HD".into(),
        link: format!("https://www.pexels.com/video/video-{id}/"),
    }
}

// =============================================================================
// Fake Catalog
// =============================================================================

/// In-memory catalog with call counters, injectable failures and delays
#[derive(Default)]
pub struct FakeCatalog {
    pub popular: Mutex<Vec<VideoItem>>,
    pub failure: Mutex<Option<RemoteError>>,
    pub popular_calls: AtomicUsize,
    pub last_per_page: AtomicUsize,
    pub searches: Mutex<Vec<String>>,
    pub info_calls: AtomicUsize,
    /// Per-id delay before `video` answers
    pub info_delays: Mutex<HashMap<u64, Duration>>,
    pub search_delay: Mutex<Duration>,
    /// Per-id duration override; `CLIP_SECS` otherwise
    pub durations: Mutex<HashMap<u64, u32>>,
}

impl FakeCatalog {
    pub fn with_popular(items: Vec<VideoItem>) -> Arc<Self> {
        let fake = Self::default();
        *fake.popular.lock().unwrap() = items;
        Arc::new(fake)
    }

    pub fn fail(&self, err: RemoteError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn delay_info(&self, id: u64, delay: Duration) {
        self.info_delays.lock().unwrap().insert(id, delay);
    }

    pub fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.lock().unwrap() = delay;
    }

    pub fn set_duration(&self, id: u64, secs: u32) {
        self.durations.lock().unwrap().insert(id, secs);
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), RemoteError> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn popular(&self, _page: u32, per_page: u32) -> Result<Vec<VideoItem>, RemoteError> {
        self.popular_calls.fetch_add(1, Ordering::SeqCst);
        self.last_per_page.store(per_page as usize, Ordering::SeqCst);
        self.check()?;
        Ok(self.popular.lock().unwrap().clone())
    }

    async fn search(
        &self,
        query: &str,
        _page: u32,
        _per_page: u32,
    ) -> Result<Vec<VideoItem>, RemoteError> {
        self.searches.lock().unwrap().push(query.to_string());
        let delay = *self.search_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(vec![VideoItem {
            title: query.to_string(),
            ..item(1000 + query.len() as u64)
        }])
    }

    async fn video(&self, id: u64) -> Result<VideoInfo, RemoteError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.info_delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;

        let secs = self
            .durations
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(CLIP_SECS);
        Ok(VideoInfo {
            id,
            title: format!("Video {id}"),
            author: "Ann".into(),
            quality: "HD".into(),
            media_link: format!("https://videos.pexels.com/{id}.mp4"),
            link: format!("https://www.pexels.com/video/video-{id}/"),
            thumbnail: String::new(),
            duration: format_mmss(secs),
            duration_secs: secs,
        })
    }
}

/// Repository over `catalog` and a fresh in-memory cache
pub fn repository(catalog: &Arc<FakeCatalog>) -> (Arc<DefaultVideoRepository>, VideoCache) {
    let cache = VideoCache::in_memory().unwrap();
    let repo = DefaultVideoRepository::new(catalog.clone(), cache.clone());
    (Arc::new(repo), cache)
}
