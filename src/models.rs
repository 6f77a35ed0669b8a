//! Data models for story items and the values passed between pipeline stages.
//!
//! This module defines the core data structures used throughout the application:
//! - [`StoryItem`]: One media unit parsed out of a user's snap list
//! - [`UserIdentity`]: The profile payload embedded alongside the stories
//! - [`FetchResult`]: The extractor's output contract
//! - [`DownloadTask`]: A unit of work handed to the download pool
//!
//! Nothing here outlives a single `download(username)` call.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Kind of media referenced by a snap.
///
/// The upstream encodes this as a small integer (`snapMediaType`). Codes the
/// application does not recognise are kept as [`MediaType::Other`] so the
/// pipeline can still name and download them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Image,
    Video,
    Other(i64),
}

impl MediaType {
    /// Map the upstream `snapMediaType` code to a media kind.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => MediaType::Image,
            1 => MediaType::Video,
            other => MediaType::Other(other),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
            MediaType::Other(code) => write!(f, "unknown({code})"),
        }
    }
}

/// One story media unit.
///
/// `id` and `timestamp_secs` are always present on a well-formed item; the
/// extractor rejects the whole response otherwise.
#[derive(Debug, Clone)]
pub struct StoryItem {
    /// Opaque snap identifier, unique within one user's story set.
    pub id: String,
    /// Absolute URL of the media asset.
    pub media_url: String,
    /// Kind of media, used to pick the file extension.
    pub media_type: MediaType,
    /// Capture time in seconds since the Unix epoch.
    pub timestamp_secs: i64,
    /// The snap exactly as it appeared in the page payload.
    pub raw: serde_json::Value,
}

/// Profile information embedded in the story page.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    /// The username as requested by the caller.
    pub username: String,
    /// Value of the profile's `$case` discriminator (e.g. `publicProfileInfo`).
    pub kind: String,
    /// The profile variant selected by `kind`.
    pub profile: serde_json::Value,
}

/// Raw page response returned by a fetcher.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What the extractor made of a page body.
#[derive(Debug)]
pub enum FetchResult {
    /// The user exists and has at least one live story.
    Stories(Vec<StoryItem>, UserIdentity),
    /// The page carries no user profile.
    NotFound,
    /// The user exists but has nothing posted right now.
    NoStories,
    /// The page could not be interpreted. `reason` is for logs only.
    MalformedResponse { reason: String },
}

impl FetchResult {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        FetchResult::MalformedResponse {
            reason: reason.into(),
        }
    }
}

/// A single scheduled download, consumed exactly once by a pool worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub media_url: String,
    pub destination: PathBuf,
    pub delay: Duration,
}

/// Metadata sidecar: the snap as received plus the owner's profile under `snapUser`.
#[derive(Debug, Serialize)]
pub struct Sidecar<'a> {
    #[serde(flatten)]
    pub snap: &'a serde_json::Value,
    #[serde(rename = "snapUser")]
    pub snap_user: &'a serde_json::Value,
}

/// Per-run counters shared by the pool workers.
#[derive(Debug, Default)]
pub struct PoolStats {
    written: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl PoolStats {
    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> DownloadSummary {
        DownloadSummary {
            written: self.written.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Final tally of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}
