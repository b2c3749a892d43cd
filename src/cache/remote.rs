use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::memory::MemoryCacheStore;
use super::store::CacheStore;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Cache store backed by a Redis-compatible REST endpoint.
///
/// Commands are POSTed as JSON arrays with a bearer token. When the endpoint
/// fails, reads and writes fall through to an in-process store with the same
/// TTL semantics. Deletes are always mirrored locally.
pub struct RestCacheStore {
    client: Client,
    rest_url: String,
    token: String,
    fallback: MemoryCacheStore,
    degraded: AtomicBool,
}

impl RestCacheStore {
    pub fn new(
        client: Client,
        rest_url: impl Into<String>,
        token: impl Into<String>,
        fallback_capacity: usize,
    ) -> Self {
        Self {
            client,
            rest_url: rest_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            fallback: MemoryCacheStore::new(fallback_capacity),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the last remote command failed
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    async fn command(&self, args: Value) -> Result<Value, AppError> {
        let response = self
            .client
            .post(&self.rest_url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::cache_error(format!(
                "cache endpoint returned HTTP {status}"
            )));
        }

        let body: CommandResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(AppError::cache_error(error));
        }
        Ok(body.result)
    }

    fn record_outcome<T>(&self, operation: &str, result: &Result<T, AppError>) {
        match result {
            Ok(_) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    info!("Remote cache recovered");
                }
            }
            Err(e) => {
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!("Remote cache {} failed, using in-process store: {}", operation, e);
                } else {
                    debug!("Remote cache {} failed: {}", operation, e);
                }
            }
        }
    }
}

#[async_trait]
impl CacheStore for RestCacheStore {
    async fn get(&self, key: &str) -> Option<String> {
        let result = self.command(json!(["GET", key])).await;
        self.record_outcome("get", &result);
        match result {
            Ok(Value::String(value)) => Some(value),
            Ok(_) => None,
            Err(_) => self.fallback.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) {
        if ttl_seconds == 0 {
            self.delete(key).await;
            return;
        }
        let result = self
            .command(json!(["SET", key, value, "EX", ttl_seconds.to_string()]))
            .await;
        self.record_outcome("set", &result);
        if result.is_err() {
            self.fallback.set(key, value, ttl_seconds).await;
        }
    }

    async fn delete(&self, key: &str) {
        let result = self.command(json!(["DEL", key])).await;
        self.record_outcome("delete", &result);
        self.fallback.delete(key).await;
    }

    async fn delete_by_pattern(&self, pattern: &str) -> usize {
        let local = self.fallback.delete_by_pattern(pattern).await;

        let keys = self.command(json!(["KEYS", pattern])).await;
        self.record_outcome("keys", &keys);
        let keys: Vec<String> = match keys {
            Ok(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => return local,
        };
        if keys.is_empty() {
            return local;
        }

        let mut args = vec![Value::String("DEL".to_string())];
        args.extend(keys.iter().cloned().map(Value::String));
        let deleted = self.command(Value::Array(args)).await;
        self.record_outcome("delete", &deleted);
        match deleted {
            Ok(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize + local,
            Ok(_) => keys.len() + local,
            Err(_) => local,
        }
    }

    async fn clear(&self) {
        let result = self.command(json!(["FLUSHDB"])).await;
        self.record_outcome("clear", &result);
        self.fallback.clear().await;
    }
}
