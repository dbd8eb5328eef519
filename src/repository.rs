//! Video repository: catalog plus cache
//!
//! Decides between the local cache and the remote catalog. Popular videos are
//! served from the cache when it has rows and written through on every network
//! fetch. Cache writes are best-effort and never fail a fetch.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::CatalogSource;
use crate::cache::VideoCache;
use crate::error::{DataError, LocalError};
use crate::models::{VideoInfo, VideoItem};

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Data access used by the coordinators
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Popular videos, from the cache when populated
    async fn popular_videos(&self) -> Result<Vec<VideoItem>, DataError>;

    /// Popular videos from the network, written through to the cache
    async fn refresh_popular(&self) -> Result<Vec<VideoItem>, DataError>;

    /// Playback detail for one video
    async fn video_info(&self, id: u64) -> Result<VideoInfo, DataError>;

    /// Search results for `query`
    async fn search(&self, query: &str) -> Result<Vec<VideoItem>, DataError>;
}

/// Repository over a catalog source and the SQLite cache
pub struct DefaultVideoRepository {
    remote: Arc<dyn CatalogSource>,
    cache: VideoCache,
    page_size: u32,
}

impl DefaultVideoRepository {
    pub fn new(remote: Arc<dyn CatalogSource>, cache: VideoCache) -> Self {
        Self {
            remote,
            cache,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Everything currently in the cache
    pub async fn cached_popular(&self) -> Result<Vec<VideoItem>, LocalError> {
        self.cache.all().await
    }

    /// Write one video to the cache
    pub async fn upsert_popular(&self, video: &VideoItem) -> Result<(), LocalError> {
        self.cache.upsert(video.clone()).await
    }

    async fn fetch_popular(&self) -> Result<Vec<VideoItem>, DataError> {
        let videos = self.remote.popular(1, self.page_size).await?;
        for video in &videos {
            if let Err(e) = self.upsert_popular(video).await {
                warn!(id = video.id, error = %e, "failed to cache video");
            }
        }
        info!(count = videos.len(), "fetched popular videos");
        Ok(videos)
    }
}

#[async_trait]
impl VideoRepository for DefaultVideoRepository {
    async fn popular_videos(&self) -> Result<Vec<VideoItem>, DataError> {
        match self.cached_popular().await {
            Ok(cached) if !cached.is_empty() => {
                debug!(count = cached.len(), "serving popular videos from cache");
                return Ok(cached);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "cache read failed, falling back to network"),
        }
        self.fetch_popular().await
    }

    async fn refresh_popular(&self) -> Result<Vec<VideoItem>, DataError> {
        self.fetch_popular().await
    }

    async fn video_info(&self, id: u64) -> Result<VideoInfo, DataError> {
        Ok(self.remote.video(id).await?)
    }

    async fn search(&self, query: &str) -> Result<Vec<VideoItem>, DataError> {
        Ok(self.remote.search(query, 1, self.page_size).await?)
    }
}
