//! Playlist repository.
//!
//! Playlists reference tracks by id and never own payloads; deleting a
//! track from the catalog leaves every playlist untouched, and dangling
//! ids are skipped at resolution time.

use crate::error::{Result, StoreError};
use crate::models::{now_millis, PlaylistRecord};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

/// Playlist repository interface.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Insert or update a playlist.
    ///
    /// On update the original `created_at` is preserved; on first save it
    /// is assigned by the store. Returns the record as stored.
    async fn save(&self, playlist: &PlaylistRecord) -> Result<PlaylistRecord>;

    /// Fetch a playlist by id.
    async fn get(&self, id: &str) -> Result<Option<PlaylistRecord>>;

    /// List playlists, most recently created first.
    async fn list(&self) -> Result<Vec<PlaylistRecord>>;

    /// Delete a playlist. Idempotent.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// SQLite implementation of [`PlaylistStore`].
#[derive(Clone)]
pub struct SqlitePlaylistStore {
    pool: SqlitePool,
}

impl SqlitePlaylistStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PlaylistRecord> {
        let track_ids_json: String = row.try_get("track_ids")?;
        let track_ids: Vec<String> =
            serde_json::from_str(&track_ids_json).map_err(|e| StoreError::InvalidInput {
                field: "track_ids".to_string(),
                message: e.to_string(),
            })?;

        Ok(PlaylistRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            cover_url: row.try_get("cover_url")?,
            track_ids,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl PlaylistStore for SqlitePlaylistStore {
    #[instrument(skip(self), fields(id = %playlist.id))]
    async fn save(&self, playlist: &PlaylistRecord) -> Result<PlaylistRecord> {
        playlist.validate().map_err(|e| StoreError::InvalidInput {
            field: "Playlist".to_string(),
            message: e,
        })?;

        let track_ids_json =
            serde_json::to_string(&playlist.track_ids).map_err(|e| StoreError::InvalidInput {
                field: "track_ids".to_string(),
                message: e.to_string(),
            })?;

        let mut tx = self.pool.begin().await?;

        let existing_created_at: Option<i64> =
            sqlx::query_scalar("SELECT created_at FROM playlists WHERE id = ?")
                .bind(&playlist.id)
                .fetch_optional(&mut *tx)
                .await?;

        let created_at = existing_created_at.unwrap_or_else(now_millis);

        sqlx::query(
            r#"
            INSERT INTO playlists (id, name, cover_url, track_ids, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                cover_url = excluded.cover_url,
                track_ids = excluded.track_ids
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.name)
        .bind(&playlist.cover_url)
        .bind(&track_ids_json)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PlaylistRecord {
            created_at,
            ..playlist.clone()
        })
    }

    async fn get(&self, id: &str) -> Result<Option<PlaylistRecord>> {
        let row = sqlx::query("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<PlaylistRecord>> {
        let rows = sqlx::query("SELECT * FROM playlists ORDER BY created_at DESC, rowid DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn playlist(id: &str, name: &str, track_ids: &[&str]) -> PlaylistRecord {
        PlaylistRecord::new(id, name, track_ids.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn save_and_get_preserves_order_and_duplicates() {
        let store = SqlitePlaylistStore::new(create_test_pool().await.unwrap());
        let saved = store
            .save(&playlist("p1", "Morning", &["a", "b", "a", "c"]))
            .await
            .unwrap();
        assert!(saved.created_at > 0);

        let found = store.get("p1").await.unwrap().unwrap();
        assert_eq!(found.track_ids, vec!["a", "b", "a", "c"]);
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let store = SqlitePlaylistStore::new(create_test_pool().await.unwrap());
        let first = store.save(&playlist("p1", "Old name", &["a"])).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut renamed = first.clone();
        renamed.name = "New name".to_string();
        renamed.track_ids.push("b".to_string());
        // Callers cannot force a different creation time.
        renamed.created_at = 1;
        let second = store.save(&renamed).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        let found = store.get("p1").await.unwrap().unwrap();
        assert_eq!(found.name, "New name");
        assert_eq!(found.track_ids, vec!["a", "b"]);
        assert_eq!(found.created_at, first.created_at);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = SqlitePlaylistStore::new(create_test_pool().await.unwrap());
        store.save(&playlist("p1", "First", &[])).await.unwrap();
        store.save(&playlist("p2", "Second", &[])).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "p2");
        assert_eq!(all[1].id, "p1");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SqlitePlaylistStore::new(create_test_pool().await.unwrap());
        store.save(&playlist("p1", "Gone soon", &[])).await.unwrap();

        assert!(store.delete("p1").await.unwrap());
        assert!(!store.delete("p1").await.unwrap());
        assert!(store.get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let store = SqlitePlaylistStore::new(create_test_pool().await.unwrap());
        let err = store.save(&playlist("p1", "  ", &[])).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }
}
