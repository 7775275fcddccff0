//! The assembled local store: pool, repositories, lease keeping and the
//! durability signal, opened and closed as one unit.

use crate::db::{self, DatabaseConfig};
use crate::durability::{DurabilityGrant, DurabilityHost};
use crate::error::Result;
use crate::favorites::SqliteFavoriteStore;
use crate::lease::{LeaseConfig, LeaseManager};
use crate::payloads::SqlitePayloadStore;
use crate::playlists::SqlitePlaylistStore;
use core_runtime::events::{CoreEvent, StoreEvent};
use core_runtime::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Configuration for opening the store.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    /// Upper bound for stored payload bytes; `None` disables the cap.
    pub max_payload_bytes: Option<u64>,
    pub lease: LeaseConfig,
}

impl StoreConfig {
    pub fn new(database_path: impl AsRef<str>) -> Self {
        Self {
            database: DatabaseConfig::new(database_path),
            ..Self::default()
        }
    }

    pub fn with_max_payload_bytes(mut self, bytes: Option<u64>) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    pub fn with_lease_config(mut self, lease: LeaseConfig) -> Self {
        self.lease = lease;
        self
    }
}

/// Handle to the open local store.
///
/// Opening sequences the upgrade protocol: connect, arbitrate the schema
/// upgrade against older live instances, migrate, then take this
/// instance's lease. A background keeper renews the lease and watches for
/// release requests from newer instances, publishing
/// [`StoreEvent::ReleaseRequested`] so the host can call [`Store::close`]
/// promptly.
pub struct Store {
    pool: SqlitePool,
    payloads: SqlitePayloadStore,
    playlists: SqlitePlaylistStore,
    favorites: SqliteFavoriteStore,
    lease: LeaseManager,
    event_bus: Arc<EventBus>,
    keeper: JoinHandle<()>,
}

impl Store {
    /// Open the store, running upgrade arbitration and migrations.
    ///
    /// # Errors
    ///
    /// - [`crate::StoreError::LeaseConflict`] if an older-version instance
    ///   would not release within the configured wait (retry or reload)
    /// - [`crate::StoreError::Migration`] if a migration fails
    pub async fn open(config: StoreConfig, event_bus: Arc<EventBus>) -> Result<Self> {
        let pool = db::create_pool(&config.database).await?;

        LeaseManager::arbitrate_upgrade(&pool, &config.lease).await?;
        db::run_migrations(&pool).await?;
        db::health_check(&pool).await?;

        let lease = LeaseManager::new(pool.clone(), config.lease.clone());
        lease.acquire().await?;

        let payloads = SqlitePayloadStore::new(pool.clone())
            .with_max_bytes(config.max_payload_bytes)
            .with_event_bus(Arc::clone(&event_bus));
        let playlists = SqlitePlaylistStore::new(pool.clone());
        let favorites = SqliteFavoriteStore::new(pool.clone());

        let keeper = spawn_lease_keeper(lease.clone(), Arc::clone(&event_bus));

        info!("local store opened");
        Ok(Self {
            pool,
            payloads,
            playlists,
            favorites,
            lease,
            event_bus,
            keeper,
        })
    }

    pub fn payloads(&self) -> &SqlitePayloadStore {
        &self.payloads
    }

    pub fn playlists(&self) -> &SqlitePlaylistStore {
        &self.playlists
    }

    pub fn favorites(&self) -> &SqliteFavoriteStore {
        &self.favorites
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Request the best-effort persistence grant from the host and report
    /// the outcome on the event bus.
    pub async fn report_durability(&self, host: &dyn DurabilityHost) -> DurabilityGrant {
        let grant = host.request_persistence().await;
        info!(?grant, "durability grant reported");
        self.event_bus
            .emit(CoreEvent::Store(StoreEvent::DurabilityReported { grant }));
        grant
    }

    /// Release the lease and close the pool.
    pub async fn close(self) -> Result<()> {
        self.keeper.abort();
        if let Err(e) = self.lease.release().await {
            warn!(error = %e, "failed to release store lease");
        }
        self.pool.close().await;
        info!("local store closed");
        Ok(())
    }
}

fn spawn_lease_keeper(lease: LeaseManager, event_bus: Arc<EventBus>) -> JoinHandle<()> {
    let interval = lease.config().poll_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut announced = false;
        loop {
            ticker.tick().await;

            if let Err(e) = lease.renew().await {
                warn!(error = %e, "lease renewal failed");
                continue;
            }

            match lease.release_requested().await {
                Ok(true) if !announced => {
                    announced = true;
                    info!("newer instance requested store release");
                    event_bus.emit(CoreEvent::Store(StoreEvent::ReleaseRequested {
                        holder: lease.holder().to_string(),
                    }));
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "lease flag check failed"),
            }
        }
    })
}
