//! Data structures and types for clipdeck
//!
//! Domain records shared by the catalog client, the cache and the
//! coordinators:
//! - **VideoItem**: lightweight catalog entry used in lists (cached by id)
//! - **VideoInfo**: playback-ready detail for one video (never cached)

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

/// Quality label used when the catalog does not report one
pub const DEFAULT_QUALITY: &str = "HD";

// =============================================================================
// Catalog Models
// =============================================================================

/// Catalog entry shown in popular and search lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoItem {
    pub id: u64,
    pub title: String,
    /// Length in seconds
    pub duration: u32,
    pub thumbnail: String,
    pub author: String,
    pub quality: String,
    /// Catalog page for the video (not the media file)
    pub link: String,
}

impl VideoItem {
    /// Duration formatted as `MM:SS`
    pub fn format_duration(&self) -> String {
        format_mmss(self.duration)
    }
}

impl fmt::Display for VideoItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.title.is_empty() {
            "Untitled"
        } else {
            &self.title
        };
        write!(
            f,
            "{} [{}] {} by {}",
            title,
            self.format_duration(),
            self.quality,
            self.author
        )
    }
}

/// Detailed, playback-ready record for one video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub quality: String,
    /// Direct link to the media file handed to the engine
    pub media_link: String,
    /// Catalog page for the video
    pub link: String,
    pub thumbnail: String,
    /// Duration formatted as `MM:SS`
    pub duration: String,
    pub duration_secs: u32,
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) - {} - by {}",
            self.title, self.duration, self.quality, self.author
        )
    }
}

// =============================================================================
// Formatting helpers
// =============================================================================

/// Format whole seconds as `MM:SS` (minutes are not wrapped into hours)
pub fn format_mmss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a playback position as `MM:SS`, or `H:MM:SS` past the hour
pub fn format_clock(position: Duration) -> String {
    let total = position.as_secs();
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Derive a display title from a catalog page URL
///
/// `https://www.pexels.com/video/a-dog-running-1234/` becomes `A Dog Running`.
/// URLs without a segment after `video` yield an empty title.
pub fn title_from_url(url: &str) -> String {
    static TRAILING_ID: OnceLock<Option<Regex>> = OnceLock::new();

    let segments: Vec<&str> = url.split('/').collect();
    let Some(video_idx) = segments.iter().position(|s| *s == "video") else {
        return String::new();
    };
    let Some(slug) = segments.get(video_idx + 1).filter(|s| !s.is_empty()) else {
        return String::new();
    };

    let slug = match TRAILING_ID.get_or_init(|| Regex::new(r"-\d+$").ok()) {
        Some(re) => re.replace(slug, "").into_owned(),
        None => slug.to_string(),
    };

    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
