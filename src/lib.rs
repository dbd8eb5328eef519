//! clipdeck - browse and play Pexels videos from the terminal
//!
//! Lists popular and searched videos from the Pexels catalog, keeps popular
//! videos in a local SQLite cache, and plays a chosen video in mpv with
//! transport controls driven from the keyboard.
//!
//! # Modules
//!
//! - `models` - Catalog records and formatting helpers
//! - `api` - Pexels catalog client
//! - `cache` - SQLite cache of popular videos
//! - `repository` - Cache-versus-network policy
//! - `list` - Browse screen coordinator
//! - `player` - Playback coordinator and media engines
//! - `cli`, `commands` - Command line front end

pub mod api;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod list;
pub mod logging;
pub mod models;
pub mod player;
pub mod repository;

// Re-export commonly used types
pub use api::{CatalogSource, PexelsClient};
pub use cache::VideoCache;
pub use error::{DataError, LocalError, RemoteError};
pub use list::{ListAction, ListConfig, ListCoordinator, ListState};
pub use models::{VideoInfo, VideoItem};
pub use player::{PlaybackPhase, PlayerAction, PlayerConfig, PlayerCoordinator, PlayerState};
pub use repository::{DefaultVideoRepository, VideoRepository};
