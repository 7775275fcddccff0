//! Schema-version leases.
//!
//! Several instances of the application may have the same database open
//! (the original host runs one instance per tab/window). Upgrading the
//! schema while an older-version instance holds a connection risks
//! corruption, so arbitration is made explicit: every live instance holds a
//! lease row recording the schema version it understands, and an instance
//! that wants to open at a higher version must get the older leases out of
//! the way first.
//!
//! The protocol, mirroring the blocked/blocking handshake of the original
//! storage layer:
//!
//! 1. The upgrading instance flags `release_requested` on every
//!    older-version lease and waits, bounded by `acquire_timeout`.
//! 2. A live holder polls its own lease; on seeing the flag it publishes
//!    [`StoreEvent::ReleaseRequested`] so the host closes the store
//!    promptly instead of holding it open indefinitely.
//! 3. Leases expire after `ttl` regardless, so a crashed holder can delay
//!    an upgrade but never block it forever.
//!
//! If the wait deadline passes with a blocker still live, opening fails
//! with [`StoreError::LeaseConflict`]: the caller retries or reloads,
//! nothing is migrated and nothing is lost.
//!
//! [`StoreEvent::ReleaseRequested`]: core_runtime::events::StoreEvent

use crate::error::{Result, StoreError};
use crate::models::now_millis;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Schema version this build understands: the number of embedded
/// migrations. Newer builds only ever append.
pub const SCHEMA_VERSION: i64 = 4;

/// Lease timing configuration.
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    /// How long a lease stays valid without renewal.
    pub ttl: Duration,
    /// How long an upgrading instance waits for older leases to clear.
    pub acquire_timeout: Duration,
    /// Poll interval used while waiting and for heartbeat/flag checks.
    pub poll_interval: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Manages this instance's lease on the store.
#[derive(Clone)]
pub struct LeaseManager {
    pool: SqlitePool,
    holder: String,
    config: LeaseConfig,
}

impl LeaseManager {
    pub fn new(pool: SqlitePool, config: LeaseConfig) -> Self {
        Self {
            pool,
            holder: Uuid::new_v4().to_string(),
            config,
        }
    }

    /// Unique id of this instance's lease.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Wait until no live lease at an older schema version remains.
    ///
    /// Runs before migrations. On a fresh database the lease table does not
    /// exist yet and there is nothing to arbitrate.
    ///
    /// # Errors
    ///
    /// [`StoreError::LeaseConflict`] if a blocker is still live when the
    /// wait deadline passes.
    pub async fn arbitrate_upgrade(pool: &SqlitePool, config: &LeaseConfig) -> Result<()> {
        if !lease_table_exists(pool).await? {
            return Ok(());
        }

        let deadline = Instant::now() + config.acquire_timeout;
        loop {
            purge_expired(pool).await?;

            let blockers: Vec<String> = sqlx::query_scalar(
                "SELECT holder FROM store_leases WHERE schema_version < ?",
            )
            .bind(SCHEMA_VERSION)
            .fetch_all(pool)
            .await?;

            if blockers.is_empty() {
                return Ok(());
            }

            // Ask the older instances to let go, then give them a beat.
            sqlx::query(
                "UPDATE store_leases SET release_requested = 1 WHERE schema_version < ?",
            )
            .bind(SCHEMA_VERSION)
            .execute(pool)
            .await?;

            if Instant::now() >= deadline {
                warn!(?blockers, "older-version leases did not release in time");
                return Err(StoreError::LeaseConflict(format!(
                    "{} older-version instance(s) still hold the store",
                    blockers.len()
                )));
            }

            debug!(?blockers, "waiting for older-version leases to release");
            tokio::time::sleep(config.poll_interval).await;
        }
    }

    /// Record this instance as a live holder at [`SCHEMA_VERSION`].
    pub async fn acquire(&self) -> Result<()> {
        purge_expired(&self.pool).await?;

        let now = now_millis();
        sqlx::query(
            "INSERT INTO store_leases (holder, schema_version, acquired_at, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&self.holder)
        .bind(SCHEMA_VERSION)
        .bind(now)
        .bind(now + self.config.ttl.as_millis() as i64)
        .execute(&self.pool)
        .await?;

        info!(holder = %self.holder, version = SCHEMA_VERSION, "store lease acquired");
        Ok(())
    }

    /// Extend this lease's expiry. Called by the heartbeat.
    pub async fn renew(&self) -> Result<()> {
        sqlx::query("UPDATE store_leases SET expires_at = ? WHERE holder = ?")
            .bind(now_millis() + self.config.ttl.as_millis() as i64)
            .bind(&self.holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether an upgrading instance has asked this holder to release.
    pub async fn release_requested(&self) -> Result<bool> {
        let flagged: Option<bool> = sqlx::query_scalar(
            "SELECT release_requested FROM store_leases WHERE holder = ?",
        )
        .bind(&self.holder)
        .fetch_optional(&self.pool)
        .await?;
        Ok(flagged.unwrap_or(false))
    }

    /// Drop this instance's lease.
    pub async fn release(&self) -> Result<()> {
        sqlx::query("DELETE FROM store_leases WHERE holder = ?")
            .bind(&self.holder)
            .execute(&self.pool)
            .await?;
        info!(holder = %self.holder, "store lease released");
        Ok(())
    }
}

async fn lease_table_exists(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'store_leases'",
    )
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

async fn purge_expired(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM store_leases WHERE expires_at < ?")
        .bind(now_millis())
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn fast_config() -> LeaseConfig {
        LeaseConfig {
            ttl: Duration::from_secs(30),
            acquire_timeout: Duration::from_millis(400),
            poll_interval: Duration::from_millis(50),
        }
    }

    async fn insert_lease(pool: &SqlitePool, holder: &str, version: i64, expires_at: i64) {
        sqlx::query(
            "INSERT INTO store_leases (holder, schema_version, acquired_at, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(holder)
        .bind(version)
        .bind(now_millis())
        .bind(expires_at)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn acquire_release_round_trip() {
        let pool = create_test_pool().await.unwrap();
        let lease = LeaseManager::new(pool.clone(), fast_config());

        lease.acquire().await.unwrap();
        assert!(!lease.release_requested().await.unwrap());

        lease.release().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM store_leases")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn live_older_lease_blocks_upgrade_and_is_flagged() {
        let pool = create_test_pool().await.unwrap();
        insert_lease(&pool, "old-instance", SCHEMA_VERSION - 1, now_millis() + 60_000).await;

        let err = LeaseManager::arbitrate_upgrade(&pool, &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LeaseConflict(_)));

        // The blocker was asked to release.
        let flagged: bool = sqlx::query_scalar(
            "SELECT release_requested FROM store_leases WHERE holder = 'old-instance'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(flagged);
    }

    #[tokio::test]
    async fn expired_older_lease_does_not_block() {
        let pool = create_test_pool().await.unwrap();
        insert_lease(&pool, "crashed", SCHEMA_VERSION - 2, now_millis() - 1000).await;

        LeaseManager::arbitrate_upgrade(&pool, &fast_config())
            .await
            .unwrap();

        // The stale row was purged along the way.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM store_leases")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn upgrade_proceeds_once_blocker_releases() {
        let pool = create_test_pool().await.unwrap();
        insert_lease(&pool, "old-instance", SCHEMA_VERSION - 1, now_millis() + 60_000).await;

        let arbitration = {
            let pool = pool.clone();
            tokio::spawn(async move {
                LeaseManager::arbitrate_upgrade(
                    &pool,
                    &LeaseConfig {
                        acquire_timeout: Duration::from_secs(5),
                        ..fast_config()
                    },
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        sqlx::query("DELETE FROM store_leases WHERE holder = 'old-instance'")
            .execute(&pool)
            .await
            .unwrap();

        arbitration.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn same_version_leases_coexist() {
        let pool = create_test_pool().await.unwrap();
        let a = LeaseManager::new(pool.clone(), fast_config());
        let b = LeaseManager::new(pool.clone(), fast_config());

        a.acquire().await.unwrap();
        LeaseManager::arbitrate_upgrade(&pool, &fast_config())
            .await
            .unwrap();
        b.acquire().await.unwrap();

        assert!(!a.release_requested().await.unwrap());
        assert!(!b.release_requested().await.unwrap());
    }
}
