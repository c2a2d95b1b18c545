//! Object cache contract shared by the orchestrator and the walker

use crate::error::CacheResult;
use crate::object::{CachedObject, CertificateObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Store of validated repository objects, keyed by content hash and
/// addressable by location.
///
/// Eviction is tied to run boundaries and scoped to one trust anchor: an
/// object survives [`clear_objects`](ObjectCache::clear_objects) if another
/// trust anchor owns it or its validation timestamp was refreshed at or
/// after the given instant.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Idempotent upsert keyed by content hash
    async fn store(&self, object: CachedObject) -> CacheResult<()>;

    async fn store_certificate(&self, trust_anchor: &str, certificate: &CertificateObject) -> CacheResult<()> {
        self.store(CachedObject::from_certificate(trust_anchor, certificate)).await
    }

    /// Remove every object stored at `uri`, returning how many were removed
    async fn delete(&self, uri: &str) -> CacheResult<usize>;

    /// Mark objects as seen in the current run of `trust_anchor`, which
    /// becomes their owner
    async fn update_validation_timestamp(
        &self,
        trust_anchor: &str,
        hashes: &[String],
        validated_at: DateTime<Utc>,
    ) -> CacheResult<()>;

    /// Evict every object of `trust_anchor` last validated before `since`
    async fn clear_objects(&self, trust_anchor: &str, since: DateTime<Utc>) -> CacheResult<usize>;

    async fn objects_at(&self, uri: &str) -> CacheResult<Vec<CachedObject>>;

    async fn find(&self, hash: &str) -> CacheResult<Option<CachedObject>>;

    async fn len(&self) -> CacheResult<usize>;

    async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }
}
