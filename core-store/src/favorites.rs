//! Favorites repository.

use crate::error::{Result, StoreError};
use crate::models::{now_millis, FavoriteRecord};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Favorites repository interface.
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Mark a track as favorite. Marking an already-favorite track updates
    /// its metadata but keeps the original `marked_at`.
    async fn mark(&self, favorite: &FavoriteRecord) -> Result<FavoriteRecord>;

    /// Remove a track from favorites. Idempotent.
    async fn unmark(&self, track_id: &str) -> Result<bool>;

    /// List favorites, most recently marked first.
    async fn list(&self) -> Result<Vec<FavoriteRecord>>;

    /// Whether the track is currently favorited.
    async fn is_favorite(&self, track_id: &str) -> Result<bool>;
}

/// SQLite implementation of [`FavoriteStore`].
#[derive(Clone)]
pub struct SqliteFavoriteStore {
    pool: SqlitePool,
}

impl SqliteFavoriteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteStore for SqliteFavoriteStore {
    async fn mark(&self, favorite: &FavoriteRecord) -> Result<FavoriteRecord> {
        if favorite.track_id.trim().is_empty() {
            return Err(StoreError::InvalidInput {
                field: "track_id".to_string(),
                message: "track id must not be empty".to_string(),
            });
        }

        let mut tx = self.pool.begin().await?;

        let existing_marked_at: Option<i64> =
            sqlx::query_scalar("SELECT marked_at FROM favorites WHERE track_id = ?")
                .bind(&favorite.track_id)
                .fetch_optional(&mut *tx)
                .await?;

        let marked_at = existing_marked_at.unwrap_or_else(now_millis);

        sqlx::query(
            r#"
            INSERT INTO favorites (track_id, title, artist, cover_url, duration_secs, marked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(track_id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                cover_url = excluded.cover_url,
                duration_secs = excluded.duration_secs
            "#,
        )
        .bind(&favorite.track_id)
        .bind(&favorite.title)
        .bind(&favorite.artist)
        .bind(&favorite.cover_url)
        .bind(favorite.duration_secs)
        .bind(marked_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(FavoriteRecord {
            marked_at,
            ..favorite.clone()
        })
    }

    async fn unmark(&self, track_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE track_id = ?")
            .bind(track_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<FavoriteRecord>> {
        let favorites = sqlx::query_as::<_, FavoriteRecord>(
            "SELECT track_id, title, artist, cover_url, duration_secs, marked_at \
             FROM favorites ORDER BY marked_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(favorites)
    }

    async fn is_favorite(&self, track_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE track_id = ?")
            .bind(track_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}
