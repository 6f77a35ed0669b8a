//! Error types for the fetch and download stages.
//!
//! - [`TransportError`]: the story page could not be retrieved at all
//! - [`StoryError`]: a `download(username)` call has to stop before scheduling anything
//! - [`AssetError`]: a single media item failed; isolated to its own task

use std::path::PathBuf;

/// The initial page request failed below the HTTP status level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid story URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Reasons a whole `download(username)` call stops before any work is scheduled.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("could not reach story page for '{username}': {source}")]
    Transport {
        username: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to fetch data for '{username}' (status {status})")]
    Status { username: String, status: u16 },

    #[error("user '{username}' not found")]
    NotFound { username: String },

    #[error("could not parse response for '{username}': {reason}")]
    Malformed { username: String, reason: String },
}

/// A single media item could not be retrieved or written.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AssetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssetError::Io {
            path: path.into(),
            source,
        }
    }
}
