//! # Download Module
//!
//! Fetches a track's audio and artwork bytes and commits them atomically
//! into the local store, turning a remote track into a cached one. The
//! switch-over is lazy: a completed download never interrupts an active
//! audio session; the engine picks up the cached copy on the next play of
//! that id.

pub mod error;
pub mod fetch;
pub mod manager;

pub use error::{DownloadError, Result};
pub use fetch::{MediaFetcher, ReqwestMediaFetcher};
pub use manager::{DownloadConfig, DownloadManager};
