//! Media byte fetching.
//!
//! A thin seam over HTTP so the manager can be exercised without a
//! network; [`ReqwestMediaFetcher`] is the production implementation.

use crate::error::{DownloadError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches raw media bytes from an absolute URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Reqwest-based media fetcher.
pub struct ReqwestMediaFetcher {
    http: Client,
}

impl ReqwestMediaFetcher {
    /// Create a fetcher with its own connection pool.
    ///
    /// The request timeout is left to the caller's `tokio::time::timeout`
    /// so cancellation and deadlines live in one place (the manager).
    pub fn new() -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("aria-player-core/0.1.0")
            .build()
            .expect("default reqwest client must build");
        Self { http }
    }

    /// Share an existing client.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

impl Default for ReqwestMediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for ReqwestMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::UnexpectedStatus(response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        debug!(url, bytes = bytes.len(), "media fetched");
        Ok(bytes)
    }
}
