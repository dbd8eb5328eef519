//! Error types shared by the data layer
//!
//! Failures are classified as Remote (catalog API) or Local (cache storage).
//! `DataError::user_message` is the text shown to the user.

use thiserror::Error;

/// Catalog API failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Request timed out")]
    RequestTimeout,

    #[error("Rate limited (429)")]
    TooManyRequests,

    #[error("No internet connection")]
    NoInternet,

    #[error("Server error: {0}")]
    Server(u16),

    #[error("Invalid response: {0}")]
    Serialization(String),

    #[error("API key rejected")]
    Unauthorized,

    #[error("Resource not found (404)")]
    NotFound,

    #[error("Video has no playable file")]
    NoPlayableMedia,

    #[error("Request failed: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::RequestTimeout
        } else if err.is_connect() {
            RemoteError::NoInternet
        } else if err.is_decode() {
            RemoteError::Serialization(err.to_string())
        } else {
            RemoteError::Unknown(err.to_string())
        }
    }
}

/// Cache storage failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalError {
    #[error("Storage is full")]
    DiskFull,

    #[error("Cache error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for LocalError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DiskFull) => LocalError::DiskFull,
            _ => LocalError::Storage(err.to_string()),
        }
    }
}

/// Any data-layer failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Local(#[from] LocalError),
}

impl DataError {
    pub fn is_remote(&self) -> bool {
        matches!(self, DataError::Remote(_))
    }

    /// Message suitable for display next to a retry affordance
    pub fn user_message(&self) -> String {
        let msg = match self {
            DataError::Remote(RemoteError::RequestTimeout) => "The request timed out.",
            DataError::Remote(RemoteError::TooManyRequests) => {
                "Oops, it seems your quota is exceeded."
            }
            DataError::Remote(RemoteError::NoInternet) => "Couldn't reach the server.",
            DataError::Remote(RemoteError::Server(_)) => "Something went wrong on the server.",
            DataError::Remote(RemoteError::Serialization(_)) => "Couldn't parse the data.",
            DataError::Remote(RemoteError::Unauthorized) => "The API key was rejected.",
            DataError::Remote(RemoteError::NotFound) => "This video no longer exists.",
            DataError::Remote(RemoteError::NoPlayableMedia) => "This video can't be played.",
            DataError::Remote(RemoteError::Unknown(_)) => "Oops, an unknown error occurred.",
            DataError::Local(LocalError::DiskFull) => "The storage is full.",
            DataError::Local(LocalError::Storage(_)) => "Oops, an unknown error occurred.",
        };
        msg.to_string()
    }
}
