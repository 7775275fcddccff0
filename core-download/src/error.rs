use thiserror::Error;

/// Errors that can occur while downloading a track into the local store.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The audio fetch failed at the transport level.
    #[error("Network failure: {0}")]
    Network(String),

    /// The media host answered with a non-success status.
    #[error("Download source returned status {0}")]
    UnexpectedStatus(u16),

    /// Committing to the local store failed; quota rejections surface as
    /// [`core_store::StoreError::QuotaExceeded`] inside this variant.
    #[error("Store failure: {0}")]
    Store(#[from] core_store::StoreError),

    /// The configured per-download deadline passed.
    #[error("Download timed out")]
    Timeout,

    /// The download was abandoned before commit; the store is untouched.
    #[error("Download cancelled")]
    Cancelled,

    /// A download for this id is already running.
    #[error("Download already in progress for {0}")]
    AlreadyInProgress(String),

    /// The track has no remote audio source to fetch.
    #[error("Track has no remote audio source: {0}")]
    NotDownloadable(String),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
