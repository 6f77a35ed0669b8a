//! Per-user download orchestration.
//!
//! A [`Dispatcher`] drives one `download(username)` call through its states:
//!
//! ```text
//! Idle ─► Fetching ─┬─► NotFound / FetchFailed / Malformed   (terminal, nothing on disk)
//!                   └─► Extracted ─┬─► NoStories              (terminal, success)
//!                                  └─► Scheduling ─► Running ─► Completed
//!
//! any state ─► Interrupted   (cancellation token fired)
//! ```
//!
//! Scheduling feeds a bounded queue drained by `max_workers` worker tasks.
//! The cancellation token is checked before every submission and raced
//! against every blocking wait, so an interrupt returns control at once
//! without waiting on in-flight network I/O.

use crate::cli::ExtractorKind;
use crate::config::DownloadConfig;
use crate::downloader::{Fetched, HttpDownloader, MediaDownloader};
use crate::error::{AssetError, StoryError};
use crate::extractor::{Extractor, HtmlExtractor, RegexExtractor};
use crate::fetcher::{StoryFetcher, WebFetcher};
use crate::models::{
    DownloadSummary, DownloadTask, FetchResult, PoolStats, Sidecar, StoryItem, UserIdentity,
};
use crate::namer::{Namer, sidecar_path};
use crate::utils::truncate_for_log;
use futures::future::join_all;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How a `download(username)` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// HTTP 404, or the page carried no user profile.
    UserNotFound,
    /// The story page answered with another non-success status.
    FetchFailed { status: u16 },
    /// The story page could not be reached.
    Unreachable,
    /// The page could not be interpreted.
    Malformed,
    /// The user exists but has no live stories.
    NoStories,
    /// Every story was scheduled and the pool drained.
    Completed {
        stories: usize,
        summary: DownloadSummary,
    },
    /// Cancelled; `submitted` tasks had been handed to the pool.
    Interrupted { submitted: usize },
}

impl From<&StoryError> for DownloadOutcome {
    fn from(err: &StoryError) -> Self {
        match err {
            StoryError::Transport { .. } => DownloadOutcome::Unreachable,
            StoryError::Status { status, .. } => DownloadOutcome::FetchFailed { status: *status },
            StoryError::NotFound { .. } => DownloadOutcome::UserNotFound,
            StoryError::Malformed { .. } => DownloadOutcome::Malformed,
        }
    }
}

/// Runs the fetch → extract → name → download pipeline for one user at a time.
pub struct Dispatcher {
    fetcher: Arc<dyn StoryFetcher>,
    extractor: Arc<dyn Extractor>,
    downloader: Arc<dyn MediaDownloader>,
    namer: Namer,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        fetcher: Arc<dyn StoryFetcher>,
        extractor: Arc<dyn Extractor>,
        downloader: Arc<dyn MediaDownloader>,
        config: DownloadConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            downloader,
            namer: Namer::new(config.root.clone()),
            config,
            cancel,
        }
    }

    /// Wire up the HTTP-backed fetcher and downloader around one shared client.
    pub fn with_client(client: Client, config: DownloadConfig, cancel: CancellationToken) -> Self {
        let extractor: Arc<dyn Extractor> = match config.extractor {
            ExtractorKind::Regex => Arc::new(RegexExtractor),
            ExtractorKind::Html => Arc::new(HtmlExtractor),
        };
        Self::new(
            Arc::new(WebFetcher::new(client.clone(), config.endpoint.clone())),
            extractor,
            Arc::new(HttpDownloader::new(client)),
            config,
            cancel,
        )
    }

    /// Download every live story of `username`. Never fails; the outcome says what happened.
    #[instrument(level = "info", skip(self))]
    pub async fn download(&self, username: &str) -> DownloadOutcome {
        if self.cancel.is_cancelled() {
            return DownloadOutcome::Interrupted { submitted: 0 };
        }

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!(%username, "Interrupted while fetching stories");
                return DownloadOutcome::Interrupted { submitted: 0 };
            }
            fetched = self.fetch_stories(username) => fetched,
        };

        let (mut stories, identity) = match fetched {
            Ok(Some(found)) => found,
            Ok(None) => {
                if !self.config.quiet {
                    info!(%username, "{username} has no stories");
                }
                return DownloadOutcome::NoStories;
            }
            Err(e) => {
                error!(
                    %username,
                    error = %e,
                    "Could not fetch data for '{username}'; the user may not exist or has no public stories"
                );
                return DownloadOutcome::from(&e);
            }
        };

        debug!(user = %identity.username, profile_kind = %identity.kind, "Resolved user profile");
        info!(%username, stories = stories.len(), "[+] {username} has {} stories", stories.len());
        if let Some(limit) = self.config.limit_story {
            if stories.len() > limit {
                debug!(limit, dropped = stories.len() - limit, "Applying story limit");
                stories.truncate(limit);
            }
        }

        self.schedule(username, &stories, &identity).await
    }

    /// Fetch and interpret the story page. `Ok(None)` means the user has no stories.
    pub async fn fetch_stories(
        &self,
        username: &str,
    ) -> Result<Option<(Vec<StoryItem>, UserIdentity)>, StoryError> {
        let response = self
            .fetcher
            .fetch(username)
            .await
            .map_err(|source| StoryError::Transport {
                username: username.to_string(),
                source,
            })?;

        if response.status == 404 {
            return Err(StoryError::NotFound {
                username: username.to_string(),
            });
        }
        if !response.is_success() {
            return Err(StoryError::Status {
                username: username.to_string(),
                status: response.status,
            });
        }

        match self.extractor.extract(username, &response.body) {
            FetchResult::Stories(items, identity) => Ok(Some((items, identity))),
            FetchResult::NoStories => Ok(None),
            FetchResult::NotFound => Err(StoryError::NotFound {
                username: username.to_string(),
            }),
            FetchResult::MalformedResponse { reason } => {
                debug!(preview = %truncate_for_log(&response.body, 300), "Unrecognised story page");
                Err(StoryError::Malformed {
                    username: username.to_string(),
                    reason,
                })
            }
        }
    }

    /// Prepare a task for `item`: create its directory and, if enabled, its sidecar.
    async fn prepare(
        &self,
        username: &str,
        item: &StoryItem,
        identity: &UserIdentity,
    ) -> Result<DownloadTask, AssetError> {
        let (media_url, destination) = self.namer.name(item, username);

        if let Some(dir) = destination.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| AssetError::io(dir, e))?;
        }

        if self.config.dump_json {
            write_sidecar(&destination, item, identity).await?;
        }

        Ok(DownloadTask {
            media_url,
            destination,
            delay: self.config.sleep_interval,
        })
    }

    #[instrument(level = "info", skip_all, fields(%username, stories = stories.len()))]
    async fn schedule(
        &self,
        username: &str,
        stories: &[StoryItem],
        identity: &UserIdentity,
    ) -> DownloadOutcome {
        let stats = Arc::new(PoolStats::default());
        let (tx, workers) = spawn_pool(
            Arc::clone(&self.downloader),
            self.config.max_workers,
            Arc::clone(&stats),
            self.cancel.clone(),
        );

        let mut submitted = 0usize;
        for item in stories {
            if self.cancel.is_cancelled() {
                return self.interrupted(username, submitted);
            }

            let task = match self.prepare(username, item, identity).await {
                Ok(task) => task,
                Err(e) => {
                    error!(id = %item.id, error = %e, "Could not prepare story; skipping");
                    stats.record_failed();
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.interrupted(username, submitted),
                sent = tx.send(task) => {
                    if sent.is_err() {
                        warn!("Download pool closed early");
                        break;
                    }
                }
            }
            submitted += 1;
            debug!(id = %item.id, media = %item.media_type, submitted, "Submitted download");
        }
        drop(tx);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.interrupted(username, submitted),
            _ = join_all(workers) => {}
        }

        let summary = stats.summary();
        info!(
            %username,
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            "[✔] {} stories downloaded for {username}",
            stories.len()
        );
        DownloadOutcome::Completed {
            stories: stories.len(),
            summary,
        }
    }

    fn interrupted(&self, username: &str, submitted: usize) -> DownloadOutcome {
        warn!(%username, submitted, "Interrupted; no further downloads will be submitted");
        DownloadOutcome::Interrupted { submitted }
    }
}

/// Start `size` workers pulling from a bounded queue of the same capacity.
///
/// Workers stop once the queue is closed and drained, or as soon as `cancel`
/// fires, abandoning whatever download they were running.
fn spawn_pool(
    downloader: Arc<dyn MediaDownloader>,
    size: usize,
    stats: Arc<PoolStats>,
    cancel: CancellationToken,
) -> (mpsc::Sender<DownloadTask>, Vec<JoinHandle<()>>) {
    let size = size.max(1);
    let (tx, rx) = mpsc::channel::<DownloadTask>(size);
    let rx = Arc::new(Mutex::new(rx));

    let workers = (0..size)
        .map(|worker| {
            let rx = Arc::clone(&rx);
            let downloader = Arc::clone(&downloader);
            let stats = Arc::clone(&stats);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        task = async { rx.lock().await.recv().await } => task,
                    };
                    let Some(task) = next else { break };

                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        result = downloader.download(&task) => result,
                    };
                    match result {
                        Ok(Fetched::Written { bytes }) => {
                            stats.record_written();
                            info!(worker, path = %task.destination.display(), bytes, "Downloaded story");
                        }
                        Ok(Fetched::Skipped) => {
                            stats.record_skipped();
                            debug!(worker, path = %task.destination.display(), "Already downloaded");
                        }
                        Err(e) => {
                            stats.record_failed();
                            error!(worker, url = %task.media_url, error = %e, "Story download failed");
                        }
                    }
                }
            })
        })
        .collect();

    (tx, workers)
}

async fn write_sidecar(
    media_path: &Path,
    item: &StoryItem,
    identity: &UserIdentity,
) -> Result<(), AssetError> {
    let sidecar = Sidecar {
        snap: &item.raw,
        snap_user: &identity.profile,
    };
    let json = serde_json::to_vec_pretty(&sidecar)?;
    let path = sidecar_path(media_path);
    fs::write(&path, json)
        .await
        .map_err(|e| AssetError::io(&path, e))
}
