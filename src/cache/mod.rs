pub mod memory;
pub mod remote;
pub mod store;
pub mod types;

pub use memory::MemoryCacheStore;
pub use remote::RestCacheStore;
pub use store::{CacheStore, get_json, set_json};
pub use types::{CachedValue, glob_match};

use std::sync::Arc;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::AppError;
use crate::upstream::create_http_client_with_timeout;

/// Picks the remote store when both URL and token are configured, otherwise
/// an in-process store
pub fn build_cache_store(
    config: &CacheConfig,
    http_timeout_seconds: u64,
) -> Result<Arc<dyn CacheStore>, AppError> {
    build_store(config, http_timeout_seconds, config.max_entries, "payload")
}

/// Store for last-known-good slots and refresh markers. Same backend as the
/// payload store but never shares an in-process capacity with it.
pub fn build_durable_store(
    config: &CacheConfig,
    http_timeout_seconds: u64,
) -> Result<Arc<dyn CacheStore>, AppError> {
    build_store(config, http_timeout_seconds, config.durable_max_entries, "durable")
}

fn build_store(
    config: &CacheConfig,
    http_timeout_seconds: u64,
    capacity: usize,
    role: &str,
) -> Result<Arc<dyn CacheStore>, AppError> {
    match (&config.rest_url, &config.rest_token) {
        (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {
            info!("Using remote {} cache store at {}", role, url);
            let client = create_http_client_with_timeout(http_timeout_seconds)?;
            Ok(Arc::new(RestCacheStore::new(
                client,
                url.clone(),
                token.clone(),
                capacity,
            )))
        }
        _ => {
            info!(
                "Remote cache not configured, using in-process {} store ({} entries)",
                role, capacity
            );
            Ok(Arc::new(MemoryCacheStore::new(capacity)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_cache_store_without_remote() {
        let config = CacheConfig::default();
        let store = build_cache_store(&config, 5).unwrap();
        store.set("k", "v".to_string(), 60).await;
        assert_eq!(store.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_durable_store_is_separate_without_remote() {
        let config = CacheConfig::default();
        let payloads = build_cache_store(&config, 5).unwrap();
        let durable = build_durable_store(&config, 5).unwrap();

        durable.set("lkg:acme:abc", "v".to_string(), 60).await;
        payloads.clear().await;
        assert_eq!(durable.get("lkg:acme:abc").await.as_deref(), Some("v"));
        assert!(payloads.get("lkg:acme:abc").await.is_none());
    }
}
