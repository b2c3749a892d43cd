//! End-to-end orchestrator scenarios over an in-memory upstream and cache

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use discovery_events::cache::{CacheStore, MemoryCacheStore};
use discovery_events::config::{StaticTenantDirectory, TenantConfig};
use discovery_events::discovery::{
    CacheStatus, DiscoveryRequest, DiscoveryService, DiscoverySettings, Mode,
};
use discovery_events::error::AppError;
use discovery_events::testing_utils::{MockUpstreamClient, TestDataBuilder};
use std::collections::HashSet;
use std::sync::Arc;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

struct Harness {
    service: DiscoveryService,
    upstream: Arc<MockUpstreamClient>,
    cache: Arc<MemoryCacheStore>,
}

fn harness(tenants: Vec<TenantConfig>) -> Harness {
    let upstream = Arc::new(MockUpstreamClient::new());
    let cache = Arc::new(MemoryCacheStore::new(100));
    let service = DiscoveryService::new(
        Arc::new(StaticTenantDirectory::new(tenants)),
        upstream.clone(),
        cache.clone(),
        DiscoverySettings::default(),
    );
    Harness {
        service,
        upstream,
        cache,
    }
}

fn acme_harness() -> Harness {
    let h = harness(vec![TestDataBuilder::tenant("acme", &["10", "20"])]);
    h.upstream
        .set_programs("10", TestDataBuilder::daily_programs("a", "2024-01-16", 5));
    h.upstream
        .set_programs("20", TestDataBuilder::daily_programs("b", "2024-01-16", 3));
    h
}

fn event_ids(response: &discovery_events::DiscoveryResponse) -> Vec<String> {
    response
        .payload
        .as_full()
        .unwrap()
        .data
        .iter()
        .map(|e| e.id.clone())
        .collect()
}

#[tokio::test]
async fn test_miss_then_hit_then_forced_partial_failure() {
    let h = acme_harness();

    let first = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();
    assert_eq!(first.cache_status, CacheStatus::Miss);
    let full = first.payload.as_full().unwrap();
    assert_eq!(full.data.len(), 8);
    assert_eq!(full.meta.total_events, 8);
    assert_eq!(full.meta.organization_count, 2);
    assert_eq!(full.schedule.len(), 4);
    assert_eq!(h.upstream.call_count(), 2);

    h.upstream.reset_calls();
    let second = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();
    assert_eq!(second.cache_status, CacheStatus::Hit);
    assert_eq!(second.payload, first.payload);
    assert_eq!(second.cache_key, first.cache_key);
    assert_eq!(h.upstream.call_count(), 0);

    h.upstream.set_failure("20");
    let forced = h
        .service
        .get_discovery_events_at(
            &DiscoveryRequest::tenant("acme").with_force_fresh(true),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(forced.cache_status, CacheStatus::Miss);
    let ids = event_ids(&forced);
    assert_eq!(ids.len(), 5);
    assert!(ids.iter().all(|id| id.starts_with("a-")));
    assert_eq!(
        forced.payload.as_full().unwrap().meta.failed_organizations,
        vec!["20".to_string()]
    );
}

#[tokio::test]
async fn test_partial_failure_with_three_organizations() {
    let h = harness(vec![TestDataBuilder::tenant("tri", &["1", "2", "3"])]);
    h.upstream
        .set_programs("1", TestDataBuilder::daily_programs("x", "2024-01-16", 2));
    h.upstream.set_failure("2");
    h.upstream
        .set_programs("3", TestDataBuilder::daily_programs("z", "2024-01-17", 2));

    let response = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("tri"), now())
        .await
        .unwrap();

    let ids = event_ids(&response);
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().any(|id| id.starts_with("x-")));
    assert!(ids.iter().any(|id| id.starts_with("z-")));
}

#[tokio::test]
async fn test_overlapping_organizations_are_deduplicated() {
    let h = harness(vec![TestDataBuilder::tenant("dup", &["1", "2"])]);
    // both organizations report the same events
    h.upstream
        .set_programs("1", TestDataBuilder::daily_programs("shared", "2024-01-16", 4));
    h.upstream
        .set_programs("2", TestDataBuilder::daily_programs("shared", "2024-01-16", 4));

    let response = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("dup"), now())
        .await
        .unwrap();

    let ids = event_ids(&response);
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(unique.len(), ids.len());
    // the lower organization id wins
    let full = response.payload.as_full().unwrap();
    assert!(full.data.iter().all(|e| e.organization_id == "1"));
}

#[tokio::test]
async fn test_cache_key_stability() {
    let h = harness(vec![]);
    let request = |orgs: &[&str], key: &str| {
        DiscoveryRequest::adhoc(
            orgs.iter().map(|o| o.to_string()).collect(),
            Some(key.to_string()),
        )
    };

    let a = h
        .service
        .get_discovery_events_at(&request(&["10", "20"], "k"), now())
        .await
        .unwrap();
    let b = h
        .service
        .get_discovery_events_at(&request(&["20", "10"], "k"), now())
        .await
        .unwrap();
    assert_eq!(a.cache_key, b.cache_key);
    assert!(a.cache_key.starts_with("full:adhoc:"));

    let other_orgs = h
        .service
        .get_discovery_events_at(&request(&["10"], "k"), now())
        .await
        .unwrap();
    let other_key = h
        .service
        .get_discovery_events_at(&request(&["10", "20"], "k2"), now())
        .await
        .unwrap();
    let other_facility = h
        .service
        .get_discovery_events_at(&request(&["10", "20"], "k").with_facility("7"), now())
        .await
        .unwrap();

    assert_ne!(a.cache_key, other_orgs.cache_key);
    assert_ne!(a.cache_key, other_key.cache_key);
    assert_ne!(a.cache_key, other_facility.cache_key);
}

#[tokio::test]
async fn test_stale_fallback_on_forced_refresh_failure() {
    let h = acme_harness();
    let good = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();

    h.upstream.set_failure("10");
    h.upstream.set_failure("20");

    let stale = h
        .service
        .get_discovery_events_at(
            &DiscoveryRequest::tenant("acme").with_force_fresh(true),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(stale.cache_status, CacheStatus::Stale);
    assert_eq!(stale.payload, good.payload);

    // availability overlay is derived from the same fallback
    let overlay = h
        .service
        .get_discovery_events_at(
            &DiscoveryRequest::tenant("acme")
                .with_mode(Mode::Availability)
                .with_force_fresh(true),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(overlay.cache_status, CacheStatus::Stale);
    assert_eq!(overlay.payload.as_availability().unwrap().len(), 8);
}

#[tokio::test]
async fn test_total_failure_without_fallback_is_generic_error() {
    let h = acme_harness();
    h.upstream.set_failure("10");
    h.upstream.set_failure("20");

    let result = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, AppError::EventsUnavailable));
    assert_eq!(err.public_message(), "failed to fetch events");
}

#[tokio::test]
async fn test_expired_payload_refetches_while_fallback_survives() {
    let mut tenant = TestDataBuilder::tenant("acme", &["10"]);
    tenant.cache_ttl_seconds = Some(0);
    let h = harness(vec![tenant]);
    h.upstream
        .set_programs("10", TestDataBuilder::daily_programs("a", "2024-01-16", 2));

    let first = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();
    assert_eq!(first.cache_status, CacheStatus::Miss);

    // zero TTL: the payload is gone, the next read goes upstream
    let second = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();
    assert_eq!(second.cache_status, CacheStatus::Miss);
    assert_eq!(h.upstream.call_count(), 2);

    let fingerprint = first.cache_key.rsplit(':').next().unwrap().to_string();
    assert!(
        h.service
            .durable_cache()
            .get(&format!("lkg:acme:{fingerprint}"))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_date_filters_apply_to_cached_payload() {
    let h = acme_harness();
    let request = DiscoveryRequest::tenant("acme").with_dates(
        NaiveDate::from_ymd_opt(2024, 1, 17),
        NaiveDate::from_ymd_opt(2024, 1, 18),
    );

    let filtered = h
        .service
        .get_discovery_events_at(&request, now())
        .await
        .unwrap();
    let full = filtered.payload.as_full().unwrap();
    // a-1, a-2, b-1, b-2
    assert_eq!(full.data.len(), 4);

    // the unfiltered view shares the cache entry
    let unfiltered = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();
    assert_eq!(unfiltered.cache_status, CacheStatus::Hit);
    assert_eq!(unfiltered.cache_key, filtered.cache_key);
    assert_eq!(unfiltered.payload.as_full().unwrap().data.len(), 8);
}

#[tokio::test]
async fn test_include_past_uses_separate_entry() {
    let h = harness(vec![TestDataBuilder::tenant("acme", &["10"])]);
    h.upstream
        .set_programs("10", TestDataBuilder::daily_programs("a", "2024-01-10", 10));

    let upcoming = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();
    let historical = h
        .service
        .get_discovery_events_at(
            &DiscoveryRequest::tenant("acme").with_include_past(true),
            now(),
        )
        .await
        .unwrap();

    assert_ne!(upcoming.cache_key, historical.cache_key);
    // Jan 10..19, today is Jan 15
    assert_eq!(event_ids(&upcoming).len(), 5);
    assert_eq!(event_ids(&historical).len(), 10);
}

#[tokio::test]
async fn test_organizations_fetched_concurrently() {
    let upstream = Arc::new(MockUpstreamClient::with_delay(std::time::Duration::from_millis(100)));
    let service = DiscoveryService::new(
        Arc::new(StaticTenantDirectory::new(vec![TestDataBuilder::tenant(
            "tri",
            &["1", "2", "3"],
        )])),
        upstream.clone(),
        Arc::new(MemoryCacheStore::new(10)),
        DiscoverySettings::default(),
    );

    let started = std::time::Instant::now();
    service
        .get_discovery_events_at(&DiscoveryRequest::tenant("tri"), now())
        .await
        .unwrap();

    assert_eq!(upstream.call_count(), 3);
    assert_eq!(upstream.peak_in_flight(), 3);
    assert!(started.elapsed() < std::time::Duration::from_millis(300));
}

#[tokio::test]
async fn test_adhoc_traffic_cannot_evict_tenant_fallback() {
    let h = acme_harness();
    let good = h
        .service
        .get_discovery_events_at(&DiscoveryRequest::tenant("acme"), now())
        .await
        .unwrap();

    // far more distinct scopes than the payload store holds
    for n in 0..300 {
        let request = DiscoveryRequest::adhoc(vec![format!("x{n}")], Some("k".to_string()));
        h.service.get_discovery_events_at(&request, now()).await.unwrap();
    }
    for n in 0..50 {
        let request = DiscoveryRequest::tenant("acme").with_facility(format!("f{n}"));
        h.service.get_discovery_events_at(&request, now()).await.unwrap();
    }
    assert_eq!(h.cache.len().await, h.cache.capacity().await);

    h.upstream.set_failure("10");
    h.upstream.set_failure("20");
    let stale = h
        .service
        .get_discovery_events_at(
            &DiscoveryRequest::tenant("acme").with_force_fresh(true),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(stale.cache_status, CacheStatus::Stale);
    assert_eq!(stale.payload, good.payload);
}

#[tokio::test]
async fn test_adhoc_scopes_have_no_fallback_slot() {
    let h = harness(vec![]);
    h.upstream
        .set_programs("7", TestDataBuilder::daily_programs("x", "2024-01-16", 2));
    let request = DiscoveryRequest::adhoc(vec!["7".to_string()], Some("k".to_string()));
    h.service.get_discovery_events_at(&request, now()).await.unwrap();

    h.upstream.set_failure("7");
    let result = h
        .service
        .get_discovery_events_at(&request.clone().with_force_fresh(true), now())
        .await;
    assert!(matches!(result, Err(AppError::EventsUnavailable)));
}

#[tokio::test]
async fn test_date_filters_leave_availability_overlay_whole() {
    let h = acme_harness();
    let request = DiscoveryRequest::tenant("acme")
        .with_mode(Mode::Availability)
        .with_dates(
            NaiveDate::from_ymd_opt(2024, 1, 17),
            NaiveDate::from_ymd_opt(2024, 1, 17),
        );

    let response = h
        .service
        .get_discovery_events_at(&request, now())
        .await
        .unwrap();
    assert_eq!(response.payload.as_availability().unwrap().len(), 8);
}
