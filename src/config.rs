//! Configuration management for clipdeck
//!
//! Handles config file loading/saving and API key resolution.
//! Config is stored at ~/.config/clipdeck/config.toml

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::list::ListConfig;
use crate::player::PlayerConfig;
use crate::repository::DEFAULT_PAGE_SIZE;

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "PEXELS_API_KEY";

const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_CONTROLS_HIDE_MS: u64 = 3000;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pexels API key
    pub api_key: Option<String>,
    /// Catalog base URL (tests and proxies)
    pub base_url: Option<String>,
    /// Items per listing page
    pub page_size: Option<u32>,
    /// SQLite cache location
    pub cache_path: Option<PathBuf>,
    /// mpv binary name or path
    pub mpv_path: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub controls_hide_ms: Option<u64>,
    pub search_debounce_ms: Option<u64>,
}

impl Config {
    /// Get config file path (~/.config/clipdeck/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clipdeck").join("config.toml"))
    }

    /// Data directory for the cache and logs (~/.local/share/clipdeck)
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("clipdeck"))
    }

    /// Load config from the default path, or defaults if there is none
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Get the API key with fallback chain:
    /// 1. Environment variable PEXELS_API_KEY
    /// 2. Key from the config file
    pub fn api_key(&self) -> Result<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Result<String> {
        let key = from_env
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()));

        match key {
            Some(key) => Ok(key.trim().to_string()),
            None => bail!(
                "No Pexels API key. Set {} or add api_key to {}",
                API_KEY_ENV,
                Self::path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "config.toml".into())
            ),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// Cache file, defaulting under the data directory
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }
        Self::data_dir()
            .map(|d| d.join("videos.db"))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
    }

    pub fn mpv_path(&self) -> String {
        self.mpv_path.clone().unwrap_or_else(|| "mpv".into())
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            poll_interval: Duration::from_millis(
                self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS).max(1),
            ),
            controls_hide_delay: Duration::from_millis(
                self.controls_hide_ms.unwrap_or(DEFAULT_CONTROLS_HIDE_MS),
            ),
            ..PlayerConfig::default()
        }
    }

    pub fn list_config(&self) -> ListConfig {
        ListConfig {
            search_debounce: Duration::from_millis(
                self.search_debounce_ms.unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.mpv_path(), "mpv");
        assert_eq!(
            config.player_config().poll_interval,
            Duration::from_millis(500)
        );
        assert_eq!(
            config.player_config().controls_hide_delay,
            Duration::from_secs(3)
        );
        assert_eq!(
            config.list_config().search_debounce,
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_env_key_wins() {
        let config = Config {
            api_key: Some("from-file".into()),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_api_key(Some("from-env".into())).unwrap(),
            "from-env"
        );
        assert_eq!(config.resolve_api_key(None).unwrap(), "from-file");
        assert_eq!(config.resolve_api_key(Some("  ".into())).unwrap(), "from-file");
    }

    #[test]
    fn test_missing_key_is_error() {
        let err = Config::default().resolve_api_key(None).unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipdeck").join("config.toml");
        let config = Config {
            api_key: Some("abc".into()),
            page_size: Some(25),
            search_debounce_ms: Some(150),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.page_size(), 25);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "mpv_path = \"/opt/mpv\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.mpv_path(), "/opt/mpv");
        assert_eq!(loaded.page_size(), 10);
    }
}
