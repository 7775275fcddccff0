//! Best-effort storage durability grant.
//!
//! Some host platforms can promise not to evict locally cached data under
//! storage pressure; most cannot. The core only ever *requests* the grant
//! and reports the outcome upward; nothing else may depend on it, and a
//! denied or unsupported grant must degrade gracefully, never crash.

use async_trait::async_trait;
pub use core_runtime::events::DurabilityGrant;

/// Host hook for requesting persistent storage.
///
/// Implemented by the embedding application; the no-op default is used
/// when the platform offers nothing.
#[async_trait]
pub trait DurabilityHost: Send + Sync {
    /// Ask the platform for a persistence grant. Must not fail: platforms
    /// without the capability answer [`DurabilityGrant::Unsupported`].
    async fn request_persistence(&self) -> DurabilityGrant;
}

/// Default host with no persistence mechanism.
pub struct NoopDurabilityHost;

#[async_trait]
impl DurabilityHost for NoopDurabilityHost {
    async fn request_persistence(&self) -> DurabilityGrant {
        DurabilityGrant::Unsupported
    }
}
