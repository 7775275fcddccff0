//! Domain models for the local store.
//!
//! Rows are metadata-first: listing never loads audio blobs; the binary
//! payload only materializes through [`crate::payloads::PayloadStore::get`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Payloads
// =============================================================================

/// Provenance of a locally stored payload.
///
/// Remote-only tracks never have a row in the store, so `remote` is not a
/// storable origin; resolution derives it from absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PayloadOrigin {
    /// Downloaded from the remote catalog.
    Cached,
    /// Imported by the user from a local file.
    Imported,
}

impl fmt::Display for PayloadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadOrigin::Cached => write!(f, "cached"),
            PayloadOrigin::Imported => write!(f, "imported"),
        }
    }
}

/// Caller-supplied track metadata accompanying a payload write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadMeta {
    /// Stable track id, unique across all origins.
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Absolute cover URL, if the track has remote artwork.
    pub cover_url: Option<String>,
    /// Track length in seconds; 0 while unknown.
    pub duration_secs: u32,
    pub origin: PayloadOrigin,
}

impl PayloadMeta {
    /// Validate the metadata before it reaches the database.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("track id must not be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        Ok(())
    }
}

/// Stored payload metadata as returned by `list()`, with no binaries attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
    pub duration_secs: u32,
    pub origin: PayloadOrigin,
    /// Size of the committed audio blob in bytes.
    pub audio_size: i64,
    /// SHA-256 of the audio blob, computed at commit time.
    pub audio_hash: String,
    pub has_cover: bool,
    /// Commit timestamp, unix milliseconds.
    pub saved_at: i64,
}

/// A fully materialized payload: metadata plus binaries.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub record: TrackRecord,
    pub audio: Bytes,
    pub cover: Option<Bytes>,
}

// =============================================================================
// Playlists
// =============================================================================

/// A named, persisted list of track references.
///
/// `created_at` is managed by the store: it is assigned on first save and
/// preserved across updates; whatever the caller puts there is ignored on
/// write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub id: String,
    pub name: String,
    pub cover_url: Option<String>,
    /// Ordered track ids; duplicates allowed. Dangling ids are tolerated
    /// and skipped at resolution time.
    pub track_ids: Vec<String>,
    /// Unix milliseconds; store-managed.
    pub created_at: i64,
}

impl PlaylistRecord {
    /// Create a new playlist record ready for saving.
    pub fn new(id: impl Into<String>, name: impl Into<String>, track_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cover_url: None,
            track_ids,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("playlist id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("playlist name must not be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// A favorited track, denormalized so the list renders offline.
///
/// `marked_at` is store-managed like `PlaylistRecord::created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FavoriteRecord {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
    pub duration_secs: u32,
    /// Unix milliseconds; store-managed.
    pub marked_at: i64,
}

/// Aggregate store usage, surfaced to the host for the library view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreUsage {
    pub payload_count: u64,
    pub audio_bytes: u64,
    pub cover_bytes: u64,
}

impl StoreUsage {
    pub fn total_bytes(&self) -> u64 {
        self.audio_bytes + self.cover_bytes
    }
}

/// Current unix time in milliseconds, the store's timestamp convention.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
