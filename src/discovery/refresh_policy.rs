use chrono::{DateTime, Utc};
use tracing::debug;

use super::cache_keys::refresh_marker_key;
use crate::cache::{CacheStore, get_json, set_json};
use crate::config::RefreshInterval;
use crate::constants::cache_ttl;

/// Whether a tenant last refreshed at `last_refreshed` is due at `now`.
/// Tenants never refreshed are always due.
pub fn should_refresh(
    last_refreshed: Option<DateTime<Utc>>,
    interval: RefreshInterval,
    now: DateTime<Utc>,
) -> bool {
    match last_refreshed {
        None => true,
        Some(last) => now - last >= interval.as_duration(),
    }
}

/// Reads the refresh marker, which outlives the payloads it describes
pub async fn read_last_refreshed(store: &dyn CacheStore, slug: &str) -> Option<DateTime<Utc>> {
    get_json::<DateTime<Utc>>(store, &refresh_marker_key(slug)).await
}

pub async fn mark_refreshed(store: &dyn CacheStore, slug: &str, at: DateTime<Utc>) {
    debug!("Marking tenant {} refreshed at {}", slug, at);
    set_json(
        store,
        &refresh_marker_key(slug),
        &at,
        cache_ttl::REFRESH_MARKER_SECONDS,
    )
    .await;
}
