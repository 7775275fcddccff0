//! Payload repository: the durable home of track audio and artwork.
//!
//! The central contract is transactional visibility: `put` commits metadata
//! and binaries in a single SQLite transaction, so an interrupted write
//! leaves either the previous payload or nothing, never a truncated blob
//! behind a live record.

use crate::error::{Result, StoreError};
use crate::models::{now_millis, CachedPayload, PayloadMeta, StoreUsage, TrackRecord};
use async_trait::async_trait;
use bytes::Bytes;
use core_runtime::events::{CoreEvent, StoreEvent};
use core_runtime::EventBus;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Payload repository interface.
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Commit a payload (audio plus optional cover) for a track id.
    ///
    /// Writing an id that already has a payload overwrites it and refreshes
    /// `saved_at`; the caller decides whether a re-cache is intended.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidInput`] if the metadata fails validation
    /// - [`StoreError::QuotaExceeded`] if the write would exceed the cap;
    ///   nothing is written
    async fn put(&self, meta: &PayloadMeta, audio: Bytes, cover: Option<Bytes>)
        -> Result<TrackRecord>;

    /// Fetch the full payload for a track id, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the stored audio no longer
    /// matches its recorded content hash; the row is left in place for the
    /// caller to delete or re-download.
    async fn get(&self, id: &str) -> Result<Option<CachedPayload>>;

    /// Remove a payload. Idempotent: deleting an absent id is a no-op.
    ///
    /// # Returns
    /// `true` if a payload was removed, `false` if none existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// List stored payload metadata, most recently saved first. Never loads
    /// binaries.
    async fn list(&self) -> Result<Vec<TrackRecord>>;

    /// Whether a committed payload exists for the id.
    async fn has(&self, id: &str) -> Result<bool>;

    /// Aggregate payload usage.
    async fn usage(&self) -> Result<StoreUsage>;
}

/// SQLite implementation of [`PayloadStore`].
#[derive(Clone)]
pub struct SqlitePayloadStore {
    pool: SqlitePool,
    max_bytes: Option<u64>,
    event_bus: Option<Arc<EventBus>>,
}

impl SqlitePayloadStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_bytes: None,
            event_bus: None,
        }
    }

    /// Cap the total bytes (audio + covers) the store may hold.
    pub fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Publish commit/delete notifications on the given bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: StoreEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Store(event));
        }
    }

    fn hash_of(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }
}

const RECORD_COLUMNS: &str = "id, title, artist, cover_url, duration_secs, origin, \
     audio_size, audio_hash, (cover IS NOT NULL) AS has_cover, saved_at";

#[async_trait]
impl PayloadStore for SqlitePayloadStore {
    #[instrument(skip(self, audio, cover), fields(id = %meta.id))]
    async fn put(
        &self,
        meta: &PayloadMeta,
        audio: Bytes,
        cover: Option<Bytes>,
    ) -> Result<TrackRecord> {
        meta.validate().map_err(|e| StoreError::InvalidInput {
            field: "PayloadMeta".to_string(),
            message: e,
        })?;

        let audio_hash = Self::hash_of(&audio);
        let saved_at = now_millis();
        let incoming = audio.len() as i64 + cover.as_ref().map(|c| c.len()).unwrap_or(0) as i64;

        let mut tx = self.pool.begin().await?;

        if let Some(limit) = self.max_bytes {
            // Existing payload for the same id is about to be replaced, so
            // it does not count against the cap.
            let held: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(audio_size + COALESCE(length(cover), 0)), 0) \
                 FROM cached_tracks WHERE id != ?",
            )
            .bind(&meta.id)
            .fetch_one(&mut *tx)
            .await?;

            if held + incoming > limit as i64 {
                return Err(StoreError::QuotaExceeded(format!(
                    "write of {incoming} bytes would exceed the {limit} byte cap"
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO cached_tracks (
                id, title, artist, cover_url, duration_secs, origin,
                audio, audio_size, audio_hash, cover, saved_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                cover_url = excluded.cover_url,
                duration_secs = excluded.duration_secs,
                origin = excluded.origin,
                audio = excluded.audio,
                audio_size = excluded.audio_size,
                audio_hash = excluded.audio_hash,
                cover = excluded.cover,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(&meta.id)
        .bind(&meta.title)
        .bind(&meta.artist)
        .bind(&meta.cover_url)
        .bind(meta.duration_secs)
        .bind(meta.origin)
        .bind(audio.as_ref())
        .bind(audio.len() as i64)
        .bind(&audio_hash)
        .bind(cover.as_deref())
        .bind(saved_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(bytes = audio.len(), "payload committed");
        self.emit(StoreEvent::PayloadCommitted {
            track_id: meta.id.clone(),
            audio_bytes: audio.len() as u64,
        });

        Ok(TrackRecord {
            id: meta.id.clone(),
            title: meta.title.clone(),
            artist: meta.artist.clone(),
            cover_url: meta.cover_url.clone(),
            duration_secs: meta.duration_secs,
            origin: meta.origin,
            audio_size: audio.len() as i64,
            audio_hash,
            has_cover: cover.is_some(),
            saved_at,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<CachedPayload>> {
        let row = sqlx::query(
            "SELECT id, title, artist, cover_url, duration_secs, origin, \
             audio, audio_size, audio_hash, cover, saved_at \
             FROM cached_tracks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let audio: Vec<u8> = row.try_get("audio")?;
        let cover: Option<Vec<u8>> = row.try_get("cover")?;
        let audio_hash: String = row.try_get("audio_hash")?;

        if Self::hash_of(&audio) != audio_hash {
            warn!(id, "stored audio fails integrity check");
            return Err(StoreError::Corrupted { id: id.to_string() });
        }

        let record = TrackRecord {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            artist: row.try_get("artist")?,
            cover_url: row.try_get("cover_url")?,
            duration_secs: row.try_get("duration_secs")?,
            origin: row.try_get("origin")?,
            audio_size: row.try_get("audio_size")?,
            audio_hash,
            has_cover: cover.is_some(),
            saved_at: row.try_get("saved_at")?,
        };

        Ok(Some(CachedPayload {
            record,
            audio: Bytes::from(audio),
            cover: cover.map(Bytes::from),
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cached_tracks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.emit(StoreEvent::PayloadDeleted {
                track_id: id.to_string(),
            });
        }
        Ok(deleted)
    }

    async fn list(&self) -> Result<Vec<TrackRecord>> {
        let records = sqlx::query_as::<_, TrackRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM cached_tracks ORDER BY saved_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn has(&self, id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_tracks WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn usage(&self) -> Result<StoreUsage> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS payload_count, \
             COALESCE(SUM(audio_size), 0) AS audio_bytes, \
             COALESCE(SUM(COALESCE(length(cover), 0)), 0) AS cover_bytes \
             FROM cached_tracks",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreUsage {
            payload_count: row.try_get::<i64, _>("payload_count")? as u64,
            audio_bytes: row.try_get::<i64, _>("audio_bytes")? as u64,
            cover_bytes: row.try_get::<i64, _>("cover_bytes")? as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::PayloadOrigin;

    fn meta(id: &str) -> PayloadMeta {
        PayloadMeta {
            id: id.to_string(),
            title: format!("Track {id}"),
            artist: "Artist".to_string(),
            cover_url: Some("https://cdn.example.com/cover.jpg".to_string()),
            duration_secs: 200,
            origin: PayloadOrigin::Cached,
        }
    }

    #[tokio::test]
    async fn put_get_round_trip_is_bit_identical() {
        let store = SqlitePayloadStore::new(create_test_pool().await.unwrap());
        let audio = Bytes::from_static(&[0u8, 1, 2, 3, 250, 251, 252]);
        let cover = Bytes::from_static(&[9u8, 9, 9]);

        store
            .put(&meta("t1"), audio.clone(), Some(cover.clone()))
            .await
            .unwrap();

        let payload = store.get("t1").await.unwrap().unwrap();
        assert_eq!(payload.audio, audio);
        assert_eq!(payload.cover.as_ref(), Some(&cover));
        assert_eq!(payload.record.origin, PayloadOrigin::Cached);
        assert_eq!(payload.record.audio_size, audio.len() as i64);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SqlitePayloadStore::new(create_test_pool().await.unwrap());
        store
            .put(&meta("t1"), Bytes::from_static(b"abc"), None)
            .await
            .unwrap();

        assert!(store.delete("t1").await.unwrap());
        assert!(store.get("t1").await.unwrap().is_none());
        // Second call is a no-op, not an error.
        assert!(!store.delete("t1").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_blob_free() {
        let store = SqlitePayloadStore::new(create_test_pool().await.unwrap());
        store
            .put(&meta("old"), Bytes::from_static(b"a"), None)
            .await
            .unwrap();
        store
            .put(&meta("new"), Bytes::from_static(b"bb"), None)
            .await
            .unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "new");
        assert_eq!(records[1].id, "old");
        assert!(!records[0].has_cover || records[0].cover_url.is_some());
    }

    #[tokio::test]
    async fn overwrite_replaces_payload_and_refreshes_saved_at() {
        let store = SqlitePayloadStore::new(create_test_pool().await.unwrap());
        let first = store
            .put(&meta("t1"), Bytes::from_static(b"first"), None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .put(&meta("t1"), Bytes::from_static(b"second"), None)
            .await
            .unwrap();

        assert!(second.saved_at >= first.saved_at);
        let payload = store.get("t1").await.unwrap().unwrap();
        assert_eq!(payload.audio, Bytes::from_static(b"second"));

        let usage = store.usage().await.unwrap();
        assert_eq!(usage.payload_count, 1);
    }

    #[tokio::test]
    async fn quota_rejects_before_writing() {
        let store = SqlitePayloadStore::new(create_test_pool().await.unwrap())
            .with_max_bytes(Some(10));

        store
            .put(&meta("small"), Bytes::from_static(b"12345"), None)
            .await
            .unwrap();

        let err = store
            .put(&meta("big"), Bytes::from_static(b"123456789"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded(_)));

        // The rejected write left no trace.
        assert!(!store.has("big").await.unwrap());
        assert_eq!(store.usage().await.unwrap().audio_bytes, 5);
    }

    #[tokio::test]
    async fn has_reflects_commits_only() {
        let store = SqlitePayloadStore::new(create_test_pool().await.unwrap());
        assert!(!store.has("t1").await.unwrap());
        store
            .put(&meta("t1"), Bytes::from_static(b"abc"), None)
            .await
            .unwrap();
        assert!(store.has("t1").await.unwrap());
    }

    #[tokio::test]
    async fn invalid_metadata_is_rejected() {
        let store = SqlitePayloadStore::new(create_test_pool().await.unwrap());
        let mut bad = meta("t1");
        bad.title = String::new();
        let err = store
            .put(&bad, Bytes::from_static(b"abc"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }
}
