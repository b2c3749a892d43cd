use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

use super::store::CacheStore;
use super::types::{CachedValue, glob_match};

/// In-process LRU cache with TTL expiry checked on read
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<String, CachedValue>>,
}

impl MemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Current number of entries, expired ones included until they are read
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn capacity(&self) -> usize {
        self.entries.read().await.cap().get()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Option<String> {
        let mut cache = self.entries.write().await;

        if let Some(cached_entry) = cache.get(key) {
            if !cached_entry.is_expired() {
                trace!(
                    "Memory cache hit: key={}, age={:?}",
                    key,
                    cached_entry.cached_at.elapsed()
                );
                return Some(cached_entry.data.clone());
            }
            debug!(
                "Removing expired memory cache entry: key={}, ttl={:?}",
                key,
                cached_entry.get_ttl()
            );
            cache.pop(key);
        }

        None
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) {
        trace!(
            "Caching value: key={}, size={}, ttl={}s",
            key,
            value.len(),
            ttl_seconds
        );
        let mut cache = self.entries.write().await;
        cache.put(key.to_string(), CachedValue::new(value, ttl_seconds));
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.pop(key);
    }

    async fn delete_by_pattern(&self, pattern: &str) -> usize {
        let mut cache = self.entries.write().await;
        let matching: Vec<String> = cache
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matching {
            cache.pop(key);
        }
        debug!(
            "Deleted {} memory cache entries matching {}",
            matching.len(),
            pattern
        );
        matching.len()
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
