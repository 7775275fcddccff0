use thiserror::Error;

/// Errors that can occur in the local store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite failure (read or write).
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Schema migration could not be applied.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// A write was rejected because it would exceed the configured store
    /// cap, or SQLite reported the disk full. Nothing was written.
    #[error("Store quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Schema upgrade arbitration failed: an older instance held its lease
    /// past the wait deadline. Retry or reload.
    #[error("Store lease conflict: {0}")]
    LeaseConflict(String),

    /// A stored payload no longer matches its recorded content hash.
    #[error("Cached payload corrupted: {id}")]
    Corrupted { id: String },

    /// Caller-supplied data failed validation; nothing was written.
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

// SQLITE_FULL surfaces as a database error; fold it into the quota variant
// so callers see a single "no space" outcome.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let full_code = db.code().map(|c| c == "13").unwrap_or(false);
            if full_code || db.message().contains("database or disk is full") {
                return StoreError::QuotaExceeded(db.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
