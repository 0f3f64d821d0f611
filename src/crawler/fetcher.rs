//! HTTP page fetcher
//!
//! A thin trait over a long-lived, timeout-bound reqwest client. The trait
//! exists so tests and alternative transports can substitute a deterministic
//! fetcher; the crawl engine only ever sees [`PageFetcher`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;

use crate::error::FetchError;

/// Default timeout applied to every page fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Abstraction over page fetching
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page body as text
    ///
    /// # Errors
    ///
    /// Any transport failure or non-2xx response is a [`FetchError`]; the
    /// orchestrator treats these as recoverable per-page errors.
    async fn fetch(&self, url: &str, user_agent: &str) -> Result<String, FetchError>;
}

/// Production fetcher backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default 30 second timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, user_agent: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}
