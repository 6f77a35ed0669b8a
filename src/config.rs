//! Runtime configuration for a download session.

use crate::cli::{Cli, ExtractorKind};
use crate::fetcher::DEFAULT_ENDPOINT;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every `download(username)` call in a session.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Root directory media is written under.
    pub root: PathBuf,
    /// Number of concurrent download workers. Always at least 1.
    pub max_workers: usize,
    /// Only the first `n` stories are considered when set.
    pub limit_story: Option<usize>,
    /// Pause after each successful download.
    pub sleep_interval: Duration,
    /// Suppress informational "no stories" messages.
    pub quiet: bool,
    /// Write a `.json` metadata sidecar next to each media file.
    pub dump_json: bool,
    /// Base URL of the story site.
    pub endpoint: String,
    /// How the embedded payload is located in the page.
    pub extractor: ExtractorKind,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            max_workers: 2,
            limit_story: None,
            sleep_interval: Duration::from_secs(1),
            quiet: false,
            dump_json: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            extractor: ExtractorKind::Regex,
        }
    }
}

impl From<&Cli> for DownloadConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            root: cli.directory_prefix.clone(),
            max_workers: cli.max_workers.max(1),
            limit_story: cli.limit_story,
            sleep_interval: Duration::try_from_secs_f64(cli.sleep_interval).unwrap_or(Duration::ZERO),
            quiet: cli.quiet,
            dump_json: cli.dump_json,
            endpoint: cli.endpoint.clone(),
            extractor: cli.extractor,
        }
    }
}
