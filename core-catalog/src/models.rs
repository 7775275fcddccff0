//! Catalog domain models.
//!
//! A [`Track`] is the one addressable track entity shared by every consumer
//! (queue, engine, download manager, playlist rendering). Its audio source
//! is a tagged variant keyed by origin, so code that handles tracks is
//! forced to consider all three provenances instead of poking at nullable
//! fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable track identifier, unique across all origins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Where a track's audio payload lives, tagged by origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum AudioSource {
    /// Streamed from the remote catalog. The URL is absolute: relative
    /// catalog URLs are resolved against the API base at parse time.
    Remote { url: String },
    /// Audio blob committed to the local store by the download manager.
    Cached { size_bytes: u64 },
    /// Audio blob imported by the user from a local file.
    Imported { size_bytes: u64 },
}

impl AudioSource {
    /// Lowercase origin tag, as carried in events.
    pub fn origin_tag(&self) -> &'static str {
        match self {
            AudioSource::Remote { .. } => "remote",
            AudioSource::Cached { .. } => "cached",
            AudioSource::Imported { .. } => "imported",
        }
    }

    /// Returns `true` if playback needs no network access.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            AudioSource::Cached { .. } | AudioSource::Imported { .. }
        )
    }
}

/// A track as seen by the rest of the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    /// Absolute cover URL, if any.
    pub cover_url: Option<String>,
    /// Seconds; 0 until known (filled in by the audio device on first
    /// playback for imported files).
    pub duration_secs: u32,
    pub source: AudioSource,
}

impl Track {
    /// Build a remote track from catalog metadata.
    pub fn remote(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            cover_url: None,
            duration_secs: 0,
            source: AudioSource::Remote { url: url.into() },
        }
    }
}

/// A live radio station.
///
/// Deliberately not a [`Track`]: stations have no duration, cannot be
/// seeked, cannot be cached, and play only in the engine's radio mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioStation {
    pub id: String,
    pub name: String,
    pub genre: String,
    /// Absolute stream URL.
    pub stream_url: String,
    pub image_url: Option<String>,
}
