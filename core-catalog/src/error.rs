use thiserror::Error;

/// Errors that can occur talking to or resolving against the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The remote fetch itself failed (DNS, connect, timeout, TLS).
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("Catalog returned status {status}: {detail}")]
    UnexpectedStatus { status: u16, detail: String },

    /// The catalog has no track with this id.
    #[error("Track not found in catalog: {0}")]
    NotFound(String),

    /// The response body did not match the expected shape.
    #[error("Failed to decode catalog response: {0}")]
    Decode(String),

    /// The configured API base URL does not parse.
    #[error("Invalid catalog base URL: {0}")]
    InvalidBaseUrl(String),
}

impl CatalogError {
    /// Returns `true` if the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Network(_) => true,
            CatalogError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
