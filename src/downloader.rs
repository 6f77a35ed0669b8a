//! Single-asset downloads.
//!
//! Each [`DownloadTask`] is streamed into a `.part` file next to its
//! destination and renamed into place only after the whole body arrived. A
//! failed or interrupted transfer therefore never leaves a file at the final
//! path. After a successful write the task sleeps for its pacing delay.

use crate::error::AssetError;
use crate::fetcher::BROWSER_USER_AGENT;
use crate::models::DownloadTask;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, instrument};

/// What happened to a task that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// The asset was written; `bytes` is its size.
    Written { bytes: u64 },
    /// A non-empty file already sat at the destination.
    Skipped,
}

/// Retrieves one media asset to disk.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download(&self, task: &DownloadTask) -> Result<Fetched, AssetError>;
}

/// [`MediaDownloader`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn stream_into(&self, url: &str, part: &Path) -> Result<u64, AssetError> {
        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = fs::File::create(part)
            .await
            .map_err(|e| AssetError::io(part, e))?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| AssetError::io(part, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| AssetError::io(part, e))?;
        Ok(written)
    }
}

#[async_trait]
impl MediaDownloader for HttpDownloader {
    #[instrument(level = "debug", skip_all, fields(path = %task.destination.display()))]
    async fn download(&self, task: &DownloadTask) -> Result<Fetched, AssetError> {
        if already_present(&task.destination).await {
            debug!("Destination exists; skipping");
            return Ok(Fetched::Skipped);
        }

        let part = partial_path(&task.destination);
        let result = match self.stream_into(&task.media_url, &part).await {
            Ok(bytes) => fs::rename(&part, &task.destination)
                .await
                .map(|_| bytes)
                .map_err(|e| AssetError::io(&task.destination, e)),
            Err(e) => Err(e),
        };

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };

        debug!(bytes, "Wrote media");
        sleep(task.delay).await;
        Ok(Fetched::Written { bytes })
    }
}

/// Temporary location a download is streamed into before the final rename.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn already_present(path: &Path) -> bool {
    matches!(fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > 0)
}
