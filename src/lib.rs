//! # Aria Player Core
//!
//! Facade crate wiring the workspace members into one bootable core: the
//! local store, the catalog client and resolver, the download manager and
//! the playback engine, sharing a single event bus.
//!
//! The host application supplies the platform pieces, an [`AudioSink`]
//! implementation (with its event channel) and optionally a
//! [`DurabilityHost`](core_store::DurabilityHost), and renders whatever
//! state the core publishes.
//!
//! ```rust,no_run
//! use aria_core::{CoreConfig, PlayerCore};
//! use core_playback::sink_channel;
//! # use std::sync::Arc;
//! # async fn example(sink: Arc<dyn core_playback::AudioSink>) -> aria_core::Result<()> {
//! let (sink_tx, sink_rx) = sink_channel();
//! // hand sink_tx to the platform audio device...
//!
//! let config = CoreConfig::new("https://api.example.com")
//!     .with_database_path("aria.db");
//! let core = PlayerCore::bootstrap(config, sink, sink_rx).await?;
//!
//! let mut events = core.events();
//! core.player().toggle_shuffle()?;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_catalog;
pub use core_download;
pub use core_playback;
pub use core_runtime;
pub use core_store;

pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, PlayerSnapshot};

use bytes::Bytes;
use core_catalog::{
    CatalogClient, CatalogResolver, RemoteCatalog, ResolvedTrack, Track, TrackId, TrackResolver,
};
use core_download::{DownloadConfig, DownloadManager, ReqwestMediaFetcher};
use core_playback::{AudioSink, PlayerEngine, PlayerHandle, SinkEventReceiver};
use core_runtime::events::Receiver;
use core_runtime::EventBus;
use core_store::{
    DurabilityGrant, DurabilityHost, NoopDurabilityHost, PayloadMeta, PayloadOrigin, PayloadStore,
    PlaylistStore, Store, StoreConfig,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The assembled player core.
pub struct PlayerCore {
    config: CoreConfig,
    event_bus: Arc<EventBus>,
    store: Store,
    catalog: CatalogClient,
    resolver: Arc<CatalogResolver>,
    downloads: Arc<DownloadManager>,
    player: PlayerHandle,
    durability: DurabilityGrant,
}

impl PlayerCore {
    /// Boot the core with the default (no-op) durability host.
    pub async fn bootstrap(
        config: CoreConfig,
        sink: Arc<dyn AudioSink>,
        sink_events: SinkEventReceiver,
    ) -> Result<Self> {
        Self::bootstrap_with_host(config, sink, sink_events, &NoopDurabilityHost).await
    }

    /// Boot the core, requesting the storage durability grant from the
    /// given host. A denied or unsupported grant is reported upward and
    /// changes nothing else.
    pub async fn bootstrap_with_host(
        config: CoreConfig,
        sink: Arc<dyn AudioSink>,
        sink_events: SinkEventReceiver,
        durability_host: &dyn DurabilityHost,
    ) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.event_capacity));

        let store = Store::open(
            StoreConfig::new(&config.database_path)
                .with_max_payload_bytes(config.max_store_bytes),
            Arc::clone(&event_bus),
        )
        .await?;

        let durability = store.report_durability(durability_host).await;

        let catalog = CatalogClient::new(&config.api_base_url, config.http_timeout)?;

        let payloads: Arc<dyn PayloadStore> = Arc::new(store.payloads().clone());
        let remote: Arc<dyn RemoteCatalog> = Arc::new(catalog.clone());
        let resolver = Arc::new(CatalogResolver::new(Arc::clone(&payloads), remote));

        let downloads = Arc::new(
            DownloadManager::new(
                Arc::new(ReqwestMediaFetcher::new()),
                Arc::clone(&payloads),
                Arc::clone(&resolver),
                DownloadConfig {
                    timeout: config.download_timeout,
                    max_concurrent: config.max_concurrent_downloads,
                },
            )
            .with_event_bus(Arc::clone(&event_bus)),
        );

        let player = PlayerEngine::spawn(
            Arc::clone(&resolver) as Arc<dyn TrackResolver>,
            sink,
            sink_events,
            Arc::clone(&event_bus),
        );

        info!("player core bootstrapped");
        Ok(Self {
            config,
            event_bus,
            store,
            catalog,
            resolver,
            downloads,
            player,
            durability,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Playback transport handle.
    pub fn player(&self) -> &PlayerHandle {
        &self.player
    }

    /// Local store repositories.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Remote catalog client (search, genres, radio stations, health).
    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// Track resolution, shared with the engine.
    pub fn resolver(&self) -> &Arc<CatalogResolver> {
        &self.resolver
    }

    /// Download manager.
    pub fn downloads(&self) -> &Arc<DownloadManager> {
        &self.downloads
    }

    /// Subscribe to core events.
    pub fn events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Outcome of the durability grant requested at bootstrap.
    pub fn durability(&self) -> DurabilityGrant {
        self.durability
    }

    /// Import a user-supplied audio file into the library.
    ///
    /// The payload is committed with origin `imported` under a generated
    /// id; duration stays 0 until the audio device reports it on first
    /// playback.
    pub async fn import_track(
        &self,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio: Bytes,
        cover: Option<Bytes>,
    ) -> Result<Track> {
        let meta = PayloadMeta {
            id: format!("local_{}", Uuid::new_v4()),
            title: title.into(),
            artist: artist.into(),
            cover_url: None,
            duration_secs: 0,
            origin: PayloadOrigin::Imported,
        };

        let record = self.store.payloads().put(&meta, audio, cover).await?;
        let id = TrackId::new(record.id.clone());
        self.resolver.invalidate(&id);

        Ok(Track {
            id,
            title: record.title,
            artist: record.artist,
            cover_url: record.cover_url,
            duration_secs: record.duration_secs,
            source: core_catalog::AudioSource::Imported {
                size_bytes: record.audio_size as u64,
            },
        })
    }

    /// Remove a track's payload from the device.
    ///
    /// A download still in flight for the id is cancelled first, so its
    /// pending commit is suppressed rather than resurrecting the payload.
    /// Playlists referencing the id are left untouched; the id resolves to
    /// remote or unavailable from now on.
    pub async fn delete_track(&self, id: &TrackId) -> Result<bool> {
        self.downloads.cancel(id);
        let deleted = self.store.payloads().delete(id.as_str()).await?;
        self.resolver.invalidate(id);
        Ok(deleted)
    }

    /// Resolve a playlist into its currently playable tracks, silently
    /// skipping dangling references.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<ResolvedTrack>> {
        let Some(playlist) = self.store.playlists().get(playlist_id).await? else {
            return Ok(Vec::new());
        };
        let ids: Vec<TrackId> = playlist.track_ids.into_iter().map(TrackId::new).collect();
        Ok(self.resolver.resolve_playable(&ids).await)
    }

    /// Stop playback, release the store lease and close the core.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.player.stop();
        self.store.close().await?;
        info!("player core shut down");
        Ok(())
    }
}
