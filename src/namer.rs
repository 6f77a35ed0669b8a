//! Deterministic output paths for story media.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! └── <username>/
//!     └── 2023-11-14/
//!         ├── 2023-11-14_22-13-20_<id>_<username>.jpg
//!         ├── 2023-11-14_22-13-20_<id>_<username>.jpg.json   (--dump-json)
//!         └── 2023-11-14_23-01-05_<id>_<username>.mp4
//! ```
//!
//! Dates and times are rendered in UTC so the same item always lands on the
//! same path regardless of the machine's timezone.

use crate::models::{MediaType, StoryItem};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Extension used for media kinds without a dedicated entry.
pub const FALLBACK_EXTENSION: &str = "bin";

/// File extension for a media kind. Total over all kinds.
pub fn extension(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Image => "jpg",
        MediaType::Video => "mp4",
        MediaType::Other(_) => FALLBACK_EXTENSION,
    }
}

/// Computes where each story item is written.
#[derive(Debug, Clone)]
pub struct Namer {
    root: PathBuf,
}

impl Namer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Return the media URL and output path for `item`.
    pub fn name(&self, item: &StoryItem, username: &str) -> (String, PathBuf) {
        let captured = capture_time(item.timestamp_secs);
        let user = path_safe(username);

        let filename = format!(
            "{}_{}_{}.{}",
            captured.format("%Y-%m-%d_%H-%M-%S"),
            path_safe(&item.id),
            user,
            extension(item.media_type),
        );
        let path = self
            .root
            .join(&user)
            .join(captured.format("%Y-%m-%d").to_string())
            .join(filename);

        (item.media_url.clone(), path)
    }
}

/// Path of the metadata sidecar for a media file: the full file name plus `.json`.
pub fn sidecar_path(media_path: &Path) -> PathBuf {
    let mut name = media_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

// Out-of-range timestamps fall back to the epoch instead of failing.
fn capture_time(timestamp_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp_secs, 0).unwrap_or_default()
}

fn path_safe(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
