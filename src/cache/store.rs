use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Key-value store with per-entry TTL.
///
/// Operations are infallible from the caller's point of view: a store that
/// cannot reach its backend degrades (misses, dropped writes, or a local
/// fallback) instead of surfacing errors.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl_seconds: u64);

    async fn delete(&self, key: &str);

    /// Removes every key matching a `*`/`?` glob, returning how many were removed
    async fn delete_by_pattern(&self, pattern: &str) -> usize;

    async fn clear(&self);
}

/// Reads and decodes a JSON value. Undecodable entries are evicted and
/// reported as a miss.
pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = store.get(key).await?;
    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Evicting undecodable cache entry {}: {}", key, e);
            store.delete(key).await;
            None
        }
    }
}

/// Encodes and stores a JSON value
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl_seconds: u64,
) {
    match serde_json::to_string(value) {
        Ok(raw) => store.set(key, raw, ttl_seconds).await,
        Err(e) => warn!("Failed to encode cache entry {}: {}", key, e),
    }
}
