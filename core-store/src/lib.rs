//! # Local Store
//!
//! Durable persistence for the player core: track payloads (audio +
//! artwork), playlists and favorites, backed by SQLite with an additive,
//! versioned schema.
//!
//! ## Guarantees
//!
//! - **Transactional payloads**: a payload is visible only once its audio
//!   blob is fully committed; interrupted writes leave the previous value
//!   or nothing.
//! - **Additive schema**: migrations only ever add; already-stored records
//!   are never destructively migrated.
//! - **Upgrade arbitration**: concurrent instances hold schema-version
//!   leases; an upgrade waits for (or times out on) older live instances,
//!   and older instances are asked to release promptly.
//! - **Graceful durability**: the persistence grant is best-effort and the
//!   store works identically when it is denied or unsupported.

pub mod db;
pub mod durability;
pub mod error;
pub mod favorites;
pub mod lease;
pub mod models;
pub mod payloads;
pub mod playlists;
pub mod store;

pub use db::DatabaseConfig;
pub use durability::{DurabilityGrant, DurabilityHost, NoopDurabilityHost};
pub use error::{Result, StoreError};
pub use favorites::{FavoriteStore, SqliteFavoriteStore};
pub use lease::{LeaseConfig, LeaseManager, SCHEMA_VERSION};
pub use models::{
    CachedPayload, FavoriteRecord, PayloadMeta, PayloadOrigin, PlaylistRecord, StoreUsage,
    TrackRecord,
};
pub use payloads::{PayloadStore, SqlitePayloadStore};
pub use playlists::{PlaylistStore, SqlitePlaylistStore};
pub use store::{Store, StoreConfig};
