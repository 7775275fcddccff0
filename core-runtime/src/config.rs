//! Core configuration shared across the workspace.
//!
//! One [`CoreConfig`] value is constructed by the host application and
//! handed to the facade at bootstrap. Members read the slices relevant to
//! them; no crate reaches into ambient globals or environment variables on
//! its own.

use crate::error::{Error, Result};
use std::time::Duration;

/// Configuration for the player core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL of the remote catalog API. Relative audio/cover URLs
    /// returned by the catalog are resolved against this.
    pub api_base_url: String,

    /// SQLite database path, or `:memory:` for an ephemeral store.
    pub database_path: String,

    /// Upper bound for stored payload bytes; `None` disables the cap.
    pub max_store_bytes: Option<u64>,

    /// Event bus channel capacity.
    pub event_capacity: usize,

    /// Timeout applied to catalog API requests.
    pub http_timeout: Duration,

    /// Timeout for a single track download (audio + cover).
    pub download_timeout: Duration,

    /// Number of downloads allowed to run concurrently.
    pub max_concurrent_downloads: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            database_path: ":memory:".to_string(),
            max_store_bytes: None,
            event_capacity: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
            http_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(300),
            max_concurrent_downloads: 2,
        }
    }
}

impl CoreConfig {
    /// Create a configuration for the given catalog base URL.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Set the SQLite database path.
    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Cap the total bytes the store may hold.
    pub fn with_max_store_bytes(mut self, bytes: u64) -> Self {
        self.max_store_bytes = Some(bytes);
        self
    }

    /// Set the event bus channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the catalog request timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the per-download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the download concurrency cap.
    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(Error::Config("api_base_url must not be empty".to_string()));
        }
        if self.database_path.is_empty() {
            return Err(Error::Config("database_path must not be empty".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if let Some(0) = self.max_store_bytes {
            return Err(Error::Config(
                "max_store_bytes must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_needs_a_base_url() {
        assert!(CoreConfig::default().validate().is_err());
        assert!(CoreConfig::new("https://api.example.com").validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = CoreConfig::new("https://api.example.com")
            .with_database_path("/tmp/aria.db")
            .with_max_store_bytes(1024)
            .with_event_capacity(16)
            .with_max_concurrent_downloads(4);

        assert_eq!(config.database_path, "/tmp/aria.db");
        assert_eq!(config.max_store_bytes, Some(1024));
        assert_eq!(config.event_capacity, 16);
        assert_eq!(config.max_concurrent_downloads, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_quota_is_rejected() {
        let config = CoreConfig::new("https://api.example.com").with_max_store_bytes(0);
        assert!(config.validate().is_err());
    }
}
