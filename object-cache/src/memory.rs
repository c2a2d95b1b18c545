//! In-memory object cache, used by tests and the `memory` backend

use crate::cache::ObjectCache;
use crate::error::CacheResult;
use crate::object::CachedObject;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Hash-keyed map behind a tokio `RwLock`
#[derive(Clone, Default)]
pub struct InMemoryObjectCache {
    objects: Arc<RwLock<HashMap<String, CachedObject>>>,
}

impl InMemoryObjectCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectCache for InMemoryObjectCache {
    async fn store(&self, object: CachedObject) -> CacheResult<()> {
        let mut objects = self.objects.write().await;
        objects.insert(object.hash.clone(), object);
        Ok(())
    }

    async fn delete(&self, uri: &str) -> CacheResult<usize> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|_, object| object.uri != uri);
        Ok(before - objects.len())
    }

    async fn update_validation_timestamp(
        &self,
        trust_anchor: &str,
        hashes: &[String],
        validated_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        let mut objects = self.objects.write().await;
        for hash in hashes {
            if let Some(object) = objects.get_mut(hash) {
                object.trust_anchor = trust_anchor.to_string();
                object.validated_at = validated_at;
            }
        }
        Ok(())
    }

    async fn clear_objects(&self, trust_anchor: &str, since: DateTime<Utc>) -> CacheResult<usize> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|_, object| object.trust_anchor != trust_anchor || object.validated_at >= since);
        let removed = before - objects.len();
        if removed > 0 {
            tracing::debug!(trust_anchor, removed, since = %since, "Evicted stale cached objects");
        }
        Ok(removed)
    }

    async fn objects_at(&self, uri: &str) -> CacheResult<Vec<CachedObject>> {
        let objects = self.objects.read().await;
        let mut found: Vec<_> = objects.values().filter(|o| o.uri == uri).cloned().collect();
        found.sort_by(|a, b| a.fetched_at.cmp(&b.fetched_at));
        Ok(found)
    }

    async fn find(&self, hash: &str) -> CacheResult<Option<CachedObject>> {
        Ok(self.objects.read().await.get(hash).cloned())
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.objects.read().await.len())
    }
}
