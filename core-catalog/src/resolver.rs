//! Catalog resolution: one source of truth for "is this track playable,
//! and from where".
//!
//! Every consumer (queue advancement, download manager, playlist
//! rendering) answers availability through [`resolve`], which checks the
//! local store first and falls back to the remote catalog. This is what
//! prevents the class of bug where a list shows a track as available while
//! the audio layer cannot actually load it.
//!
//! Results are memoized per id, so resolution is referentially stable
//! within a session: repeated calls return the same origin and payload
//! reference until a cache mutation (download commit, import, delete)
//! invalidates the entry.
//!
//! [`resolve`]: TrackResolver::resolve

use crate::client::RemoteCatalog;
use crate::error::{CatalogError, Result};
use crate::models::{AudioSource, Track, TrackId};
use async_trait::async_trait;
use bytes::Bytes;
use core_store::{PayloadOrigin, PayloadStore};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// The concrete, loadable audio reference produced by resolution.
#[derive(Debug, Clone)]
pub enum PlayableAudio {
    /// Fully committed local payload. `Bytes` clones share the buffer, so
    /// cached resolutions stay cheap.
    Local(Bytes),
    /// Absolute streaming URL.
    Remote(String),
}

/// A track together with its playable audio reference.
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    pub track: Track,
    pub audio: PlayableAudio,
}

/// Outcome of resolving a track id.
#[derive(Debug, Clone)]
pub enum Resolution {
    Playable(ResolvedTrack),
    /// No local payload and the catalog does not know the id. Consumers
    /// skip such tracks rather than failing.
    Unavailable,
}

impl Resolution {
    pub fn is_playable(&self) -> bool {
        matches!(self, Resolution::Playable(_))
    }
}

/// Resolution seam used by the playback engine.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolve an id to a playable reference, or `Unavailable`.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Network`]/[`CatalogError::UnexpectedStatus`] when
    /// the remote lookup itself fails; distinct from `Unavailable`, which
    /// is a definitive "no such source".
    async fn resolve(&self, id: &TrackId) -> Result<Resolution>;
}

/// Store-then-remote resolver with per-id memoization.
pub struct CatalogResolver {
    payloads: Arc<dyn PayloadStore>,
    remote: Arc<dyn RemoteCatalog>,
    cache: Mutex<LruCache<String, Resolution>>,
}

impl CatalogResolver {
    pub fn new(payloads: Arc<dyn PayloadStore>, remote: Arc<dyn RemoteCatalog>) -> Self {
        Self::with_cache_capacity(payloads, remote, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(
        payloads: Arc<dyn PayloadStore>,
        remote: Arc<dyn RemoteCatalog>,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            payloads,
            remote,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Drop the memoized resolution for an id. Called on every cache
    /// mutation: download commit, import, delete.
    pub fn invalidate(&self, id: &TrackId) {
        self.cache.lock().pop(id.as_str());
    }

    /// Resolve many ids, keeping only the playable ones in input order.
    ///
    /// Dangling references (deleted or never-known tracks) are skipped
    /// silently; individual lookup failures are logged and skipped so one
    /// bad id cannot take down a whole playlist render.
    pub async fn resolve_playable(&self, ids: &[TrackId]) -> Vec<ResolvedTrack> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.resolve(id).await {
                Ok(Resolution::Playable(resolved)) => out.push(resolved),
                Ok(Resolution::Unavailable) => {
                    debug!(%id, "skipping unavailable track");
                }
                Err(e) => {
                    warn!(%id, error = %e, "skipping track after lookup failure");
                }
            }
        }
        out
    }
}

#[async_trait]
impl TrackResolver for CatalogResolver {
    #[instrument(skip(self), fields(id = %id))]
    async fn resolve(&self, id: &TrackId) -> Result<Resolution> {
        if let Some(hit) = self.cache.lock().get(id.as_str()) {
            return Ok(hit.clone());
        }

        // Local payload wins over the remote catalog.
        match self.payloads.get(id.as_str()).await {
            Ok(Some(payload)) => {
                let record = payload.record;
                let source = match record.origin {
                    PayloadOrigin::Cached => AudioSource::Cached {
                        size_bytes: record.audio_size as u64,
                    },
                    PayloadOrigin::Imported => AudioSource::Imported {
                        size_bytes: record.audio_size as u64,
                    },
                };
                let resolution = Resolution::Playable(ResolvedTrack {
                    track: Track {
                        id: id.clone(),
                        title: record.title,
                        artist: record.artist,
                        cover_url: record.cover_url,
                        duration_secs: record.duration_secs,
                        source,
                    },
                    audio: PlayableAudio::Local(payload.audio),
                });
                self.cache
                    .lock()
                    .put(id.as_str().to_string(), resolution.clone());
                return Ok(resolution);
            }
            Ok(None) => {}
            // A failing store read must not make the track unplayable;
            // fall back to remote resolution for this call.
            Err(e) => warn!(%id, error = %e, "store read failed, falling back to remote"),
        }

        let resolution = match self.remote.fetch_track(id).await {
            Ok(track) => {
                let url = match &track.source {
                    AudioSource::Remote { url } => url.clone(),
                    // A remote catalog answer is remote by construction.
                    other => {
                        return Err(CatalogError::Decode(format!(
                            "catalog returned a {} source for {id}",
                            other.origin_tag()
                        )))
                    }
                };
                Resolution::Playable(ResolvedTrack {
                    track,
                    audio: PlayableAudio::Remote(url),
                })
            }
            Err(CatalogError::NotFound(_)) => Resolution::Unavailable,
            Err(e) => return Err(e),
        };

        self.cache
            .lock()
            .put(id.as_str().to_string(), resolution.clone());
        Ok(resolution)
    }
}
