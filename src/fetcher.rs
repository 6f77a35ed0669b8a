//! Story page retrieval.
//!
//! The fetcher performs exactly one `GET <endpoint>/@<username>` per call and
//! hands back the status and body untouched. Interpretation of the body is the
//! [`Extractor`](crate::extractor::Extractor)'s job; retries are not attempted.

use crate::error::TransportError;
use crate::models::HttpResponse;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::time::Instant;
use tracing::{debug, instrument};
use url::Url;

/// Public web endpoint serving story pages.
pub const DEFAULT_ENDPOINT: &str = "https://story.snapchat.com";

/// The upstream gates responses on the client signature, so requests look like a desktop browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Source of raw story pages.
#[async_trait]
pub trait StoryFetcher: Send + Sync {
    /// Fetch the story page for `username`.
    async fn fetch(&self, username: &str) -> Result<HttpResponse, TransportError>;
}

/// Build the story page URL for `username` under `endpoint`.
///
/// The username is percent-encoded so it always lands in a single path segment.
pub fn story_url(endpoint: &str, username: &str) -> Result<Url, url::ParseError> {
    let base = Url::parse(endpoint)?;
    base.join(&format!("@{}", urlencoding::encode(username)))
}

/// [`StoryFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct WebFetcher {
    client: Client,
    endpoint: String,
}

impl WebFetcher {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl StoryFetcher for WebFetcher {
    #[instrument(level = "info", skip_all, fields(%username))]
    async fn fetch(&self, username: &str) -> Result<HttpResponse, TransportError> {
        let url = story_url(&self.endpoint, username)?;
        let t0 = Instant::now();

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(
            %url,
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched story page"
        );
        Ok(HttpResponse { status, body })
    }
}
