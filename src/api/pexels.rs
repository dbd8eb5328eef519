//! Pexels video API client
//!
//! Provides popular listings, search and per-video detail.
//! API docs: https://www.pexels.com/api/documentation/#videos

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::CatalogSource;
use crate::error::RemoteError;
use crate::models::{format_mmss, title_from_url, VideoInfo, VideoItem, DEFAULT_QUALITY};

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.pexels.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Pexels API client
pub struct PexelsClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl PexelsClient {
    /// Create a new client with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Make an authenticated GET request and decode the JSON body
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T, RemoteError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "catalog request");

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map_err(|e| RemoteError::Serialization(format!("JSON parse error: {}", e)))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Unauthorized),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound),
            StatusCode::REQUEST_TIMEOUT => Err(RemoteError::RequestTimeout),
            StatusCode::TOO_MANY_REQUESTS => Err(RemoteError::TooManyRequests),
            status if status.is_server_error() => {
                warn!(%url, status = status.as_u16(), "catalog request failed");
                Err(RemoteError::Server(status.as_u16()))
            }
            status => {
                warn!(%url, status = status.as_u16(), "unexpected catalog response");
                Err(RemoteError::Unknown(format!("HTTP {}", status.as_u16())))
            }
        }
    }

    /// Get a page of popular videos
    pub async fn popular(&self, page: u32, per_page: u32) -> Result<Vec<VideoItem>, RemoteError> {
        let endpoint = format!("/v1/videos/popular?page={}&per_page={}", page, per_page);
        let response: VideoPageResponse = self.get(&endpoint).await?;
        Ok(response.into_items())
    }

    /// Search videos by free text
    pub async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<VideoItem>, RemoteError> {
        let endpoint = format!(
            "/v1/videos/search?page={}&per_page={}&query={}",
            page,
            per_page,
            urlencoding::encode(query)
        );
        let response: VideoPageResponse = self.get(&endpoint).await?;
        Ok(response.into_items())
    }

    /// Get playback detail for one video
    pub async fn video(&self, id: u64) -> Result<VideoInfo, RemoteError> {
        let endpoint = format!("/videos/videos/{}", id);
        let response: VideoRaw = self.get(&endpoint).await?;
        response.into_info()
    }
}

#[async_trait]
impl CatalogSource for PexelsClient {
    async fn popular(&self, page: u32, per_page: u32) -> Result<Vec<VideoItem>, RemoteError> {
        PexelsClient::popular(self, page, per_page).await
    }

    async fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<VideoItem>, RemoteError> {
        PexelsClient::search(self, query, page, per_page).await
    }

    async fn video(&self, id: u64) -> Result<VideoInfo, RemoteError> {
        PexelsClient::video(self, id).await
    }
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct VideoPageResponse {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_results: u64,
    videos: Vec<VideoRaw>,
}

impl VideoPageResponse {
    fn into_items(self) -> Vec<VideoItem> {
        debug!(
            page = self.page,
            total = self.total_results,
            count = self.videos.len(),
            "catalog page"
        );
        self.videos.into_iter().map(|v| v.into_item()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct VideoRaw {
    id: u64,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    image: String,
    #[serde(default)]
    url: String,
    user: Option<UserRaw>,
    #[serde(default)]
    video_files: Vec<VideoFileRaw>,
}

impl VideoRaw {
    fn author(&self) -> String {
        self.user
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    // Quality comes from the first file variant, as listed by the catalog
    fn quality(&self) -> String {
        self.video_files
            .first()
            .and_then(|f| f.quality.clone())
            .unwrap_or_else(|| DEFAULT_QUALITY.to_string())
    }

    fn into_item(self) -> VideoItem {
        VideoItem {
            id: self.id,
            title: title_from_url(&self.url),
            duration: self.duration,
            author: self.author(),
            quality: self.quality(),
            thumbnail: self.image,
            link: self.url,
        }
    }

    fn into_info(self) -> Result<VideoInfo, RemoteError> {
        let media_link = self
            .video_files
            .iter()
            .find_map(|f| f.link.clone().filter(|l| !l.is_empty()))
            .ok_or(RemoteError::NoPlayableMedia)?;

        Ok(VideoInfo {
            id: self.id,
            title: title_from_url(&self.url),
            author: self.author(),
            quality: self.quality(),
            media_link,
            duration: format_mmss(self.duration),
            duration_secs: self.duration,
            thumbnail: self.image,
            link: self.url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserRaw {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct VideoFileRaw {
    quality: Option<String>,
    link: Option<String>,
}
