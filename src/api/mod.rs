//! Catalog access layer
//!
//! - Pexels: popular listings, search and per-video detail

pub mod pexels;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{VideoInfo, VideoItem};

pub use pexels::PexelsClient;

/// Remote source of catalog records
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page of popular videos
    async fn popular(&self, page: u32, per_page: u32) -> Result<Vec<VideoItem>, RemoteError>;

    /// One page of search results for `query`
    async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<VideoItem>, RemoteError>;

    /// Playback detail for a single video
    async fn video(&self, id: u64) -> Result<VideoInfo, RemoteError>;
}
