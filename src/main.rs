//! # snapchat_dl
//!
//! Downloads the currently live public stories of one or more Snapchat users.
//!
//! ## Usage
//!
//! ```sh
//! snapchat_dl -P ./stories alice bob
//! ```
//!
//! ## Architecture
//!
//! Each username goes through the same pipeline:
//! 1. **Fetching**: one GET of the user's story page
//! 2. **Extraction**: pull the embedded `__NEXT_DATA__` payload out of the HTML
//! 3. **Naming**: compute a deterministic path per story item
//! 4. **Downloading**: a small worker pool writes each asset, pacing itself
//!
//! Ctrl-C stops scheduling immediately; in-flight downloads are abandoned.

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dispatcher;
mod downloader;
mod error;
mod extractor;
mod fetcher;
mod models;
mod namer;
mod utils;

#[cfg(test)]
mod test_support;

use cli::Cli;
use config::DownloadConfig;
use dispatcher::{Dispatcher, DownloadOutcome};
use utils::{collect_usernames, ensure_writable_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    debug!(?args, "Parsed CLI arguments");

    let usernames = collect_usernames(&args.usernames, args.input_file.as_deref()).await?;
    if usernames.is_empty() {
        error!("No usernames given; pass them as arguments or with --input-file");
        return Err("no usernames given".into());
    }

    let config = DownloadConfig::from(&args);
    if let Err(e) = ensure_writable_dir(&config.root).await {
        error!(
            path = %config.root.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // --- Interrupt handling ---
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping");
                cancel.cancel();
            }
        });
    }

    let client = Client::builder().build()?;
    let dispatcher = Dispatcher::with_client(client, config, cancel.clone());

    let mut downloaded = 0usize;
    for username in &usernames {
        match dispatcher.download(username).await {
            DownloadOutcome::Completed { stories, .. } => downloaded += stories,
            DownloadOutcome::Interrupted { submitted } => {
                downloaded += submitted;
                break;
            }
            _ => {}
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        users = usernames.len(),
        stories = downloaded,
        interrupted = cancel.is_cancelled(),
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
