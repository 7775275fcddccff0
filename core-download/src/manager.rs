//! Download orchestration: fetch a track's audio and artwork and commit
//! them into the local store as one transaction.
//!
//! Failure discipline: a failed or cancelled download leaves the store
//! exactly as it was: the commit happens only after every fatal fetch has
//! succeeded, and the store's `put` is itself transactional. Artwork is
//! best-effort: a cover fetch failure downgrades to "no cover", it never
//! fails the download.

use crate::error::{DownloadError, Result};
use crate::fetch::MediaFetcher;
use bytes::Bytes;
use core_catalog::{AudioSource, CatalogResolver, Track, TrackId};
use core_runtime::events::{CoreEvent, DownloadEvent};
use core_runtime::EventBus;
use core_store::{PayloadMeta, PayloadOrigin, PayloadStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Download manager configuration.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Deadline for fetching one track (audio + cover).
    pub timeout: Duration,
    /// Number of downloads allowed to run concurrently.
    pub max_concurrent: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_concurrent: 2,
        }
    }
}

/// Downloads tracks into the local store.
pub struct DownloadManager {
    fetcher: Arc<dyn MediaFetcher>,
    payloads: Arc<dyn PayloadStore>,
    resolver: Arc<CatalogResolver>,
    event_bus: Option<Arc<EventBus>>,
    semaphore: Arc<Semaphore>,
    active: Mutex<HashMap<String, CancellationToken>>,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        payloads: Arc<dyn PayloadStore>,
        resolver: Arc<CatalogResolver>,
        config: DownloadConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            fetcher,
            payloads,
            resolver,
            event_bus: None,
            semaphore,
            active: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Publish download lifecycle events on the given bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Download(event));
        }
    }

    /// Download a track unless it is already cached.
    ///
    /// An already-cached id is a successful no-op; re-fetching requires
    /// the explicit intent of [`redownload`](Self::redownload).
    #[instrument(skip(self, track), fields(id = %track.id))]
    pub async fn download(&self, track: &Track) -> Result<()> {
        if self.payloads.has(track.id.as_str()).await? {
            debug!("already cached, skipping download");
            return Ok(());
        }
        self.run(track).await
    }

    /// Re-cache a track: overwrite the payload and refresh its saved-at.
    #[instrument(skip(self, track), fields(id = %track.id))]
    pub async fn redownload(&self, track: &Track) -> Result<()> {
        self.run(track).await
    }

    /// Abandon an in-flight download. The pending commit is suppressed; no
    /// partial state remains.
    ///
    /// # Returns
    /// `true` if a download for the id was running.
    pub fn cancel(&self, id: &TrackId) -> bool {
        let active = self.active.lock();
        match active.get(id.as_str()) {
            Some(token) => {
                info!(%id, "cancelling download");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Ids of downloads currently in flight.
    pub fn active_downloads(&self) -> Vec<String> {
        self.active.lock().keys().cloned().collect()
    }

    async fn run(&self, track: &Track) -> Result<()> {
        let url = match &track.source {
            AudioSource::Remote { url } => url.clone(),
            AudioSource::Cached { .. } | AudioSource::Imported { .. } => {
                return Err(DownloadError::NotDownloadable(track.id.to_string()))
            }
        };

        let token = CancellationToken::new();
        {
            let mut active = self.active.lock();
            if active.contains_key(track.id.as_str()) {
                return Err(DownloadError::AlreadyInProgress(track.id.to_string()));
            }
            active.insert(track.id.as_str().to_string(), token.clone());
        }

        self.emit(DownloadEvent::Started {
            track_id: track.id.to_string(),
        });

        let result = self.fetch_and_commit(track, &url, &token).await;
        self.active.lock().remove(track.id.as_str());

        match &result {
            Ok(bytes) => {
                info!(id = %track.id, bytes, "download committed");
                self.emit(DownloadEvent::Completed {
                    track_id: track.id.to_string(),
                    audio_bytes: *bytes,
                });
            }
            Err(DownloadError::Cancelled) => {
                self.emit(DownloadEvent::Cancelled {
                    track_id: track.id.to_string(),
                });
            }
            Err(e) => {
                warn!(id = %track.id, error = %e, "download failed");
                self.emit(DownloadEvent::Failed {
                    track_id: track.id.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        result.map(|_| ())
    }

    async fn fetch_and_commit(
        &self,
        track: &Track,
        url: &str,
        token: &CancellationToken,
    ) -> Result<u64> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| DownloadError::Cancelled)?;

        let fetch = async {
            let audio = self.fetcher.fetch(url).await?;
            // Artwork is best-effort; its failure never fails the download.
            let cover = match &track.cover_url {
                Some(cover_url) => match self.fetcher.fetch(cover_url).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!(id = %track.id, error = %e, "cover fetch failed, continuing");
                        None
                    }
                },
                None => None,
            };
            Ok::<(Bytes, Option<Bytes>), DownloadError>((audio, cover))
        };

        let (audio, cover) = tokio::select! {
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
            fetched = tokio::time::timeout(self.config.timeout, fetch) => {
                fetched.map_err(|_| DownloadError::Timeout)??
            }
        };

        // A cancel that raced the end of the fetch still suppresses the
        // commit: fetched bytes are discarded on arrival.
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let meta = PayloadMeta {
            id: track.id.as_str().to_string(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            cover_url: track.cover_url.clone(),
            duration_secs: track.duration_secs,
            origin: PayloadOrigin::Cached,
        };

        let audio_bytes = audio.len() as u64;
        self.payloads.put(&meta, audio, cover).await?;

        // The next resolution of this id must see the cached origin.
        self.resolver.invalidate(&track.id);

        Ok(audio_bytes)
    }
}
