//! Cache-first aggregation of discovery events across organizations

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::cache_keys::{
    cache_key, last_known_good_key, refresh_marker_key, scope_fingerprint, tenant_pattern,
};
use super::flatten::{FlattenContext, flatten_programs, merge_events};
use super::models::{
    AvailabilityPayload, CacheStatus, CalendarEvent, DiscoveryPayload, FullPayload, Mode,
    PayloadMeta, WeekSchedule, availability_from_events,
};
use super::schedule::build_week_schedule;
use super::stats::ServiceStats;
use crate::cache::{CacheStore, MemoryCacheStore, get_json, set_json};
use crate::config::{Branding, Config, TenantConfig, TenantDirectory};
use crate::constants::{ADHOC_SCOPE, DEFAULT_SCHEDULE_WEEKS};
use crate::error::AppError;
use crate::upstream::{Program, ProgramQuery, UpstreamClient};

/// Service-wide settings of the orchestrator
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub default_api_key: Option<String>,
    pub default_ttl_seconds: u64,
    pub last_known_good_ttl_seconds: u64,
    pub schedule_weeks: i64,
    /// Capacity of the in-process store for fallback slots and refresh markers
    pub durable_capacity: usize,
}

impl DiscoverySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_api_key: config.default_api_key.clone(),
            default_ttl_seconds: config.cache.default_ttl_seconds,
            last_known_good_ttl_seconds: config.cache.last_known_good_ttl_seconds,
            schedule_weeks: DEFAULT_SCHEDULE_WEEKS,
            durable_capacity: config.cache.durable_max_entries,
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Whose events are requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryTarget {
    Tenant(String),
    Adhoc {
        organization_ids: Vec<String>,
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub target: DiscoveryTarget,
    pub mode: Mode,
    /// Replaces the tenant's facility filter when set
    pub facility_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_past: bool,
    pub force_fresh: bool,
}

impl DiscoveryRequest {
    pub fn tenant(slug: impl Into<String>) -> Self {
        Self::new(DiscoveryTarget::Tenant(slug.into()))
    }

    pub fn adhoc(organization_ids: Vec<String>, api_key: Option<String>) -> Self {
        Self::new(DiscoveryTarget::Adhoc {
            organization_ids,
            api_key,
        })
    }

    fn new(target: DiscoveryTarget) -> Self {
        Self {
            target,
            mode: Mode::Full,
            facility_id: None,
            start_date: None,
            end_date: None,
            include_past: false,
            force_fresh: false,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_facility(mut self, facility_id: impl Into<String>) -> Self {
        self.facility_id = Some(facility_id.into());
        self
    }

    /// Inclusive date range applied to full payloads at response time.
    /// Availability overlays carry no dates and are always returned whole;
    /// clients join them against the full payload they already filtered.
    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_include_past(mut self, include_past: bool) -> Self {
        self.include_past = include_past;
        self
    }

    pub fn with_force_fresh(mut self, force_fresh: bool) -> Self {
        self.force_fresh = force_fresh;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryResponse {
    pub payload: DiscoveryPayload,
    pub cache_status: CacheStatus,
    pub cache_key: String,
}

/// Everything a request resolves to before touching the cache
#[derive(Debug, Clone)]
struct ResolvedScope {
    label: String,
    organization_ids: Vec<String>,
    facility_ids: Vec<String>,
    api_key: String,
    ttl_seconds: u64,
    tz: Tz,
    branding: Branding,
    include_past: bool,
    fingerprint: String,
    /// Only a tenant's own scope gets a fallback slot; ad hoc lists and
    /// query-supplied facilities are unbounded and never write one
    keeps_last_known_good: bool,
}

struct CollectedEvents {
    events: Vec<CalendarEvent>,
    total_programs: usize,
    failed_organizations: Vec<String>,
}

pub struct DiscoveryService {
    tenants: Arc<dyn TenantDirectory>,
    upstream: Arc<dyn UpstreamClient>,
    cache: Arc<dyn CacheStore>,
    durable: Arc<dyn CacheStore>,
    settings: DiscoverySettings,
    stats: Arc<ServiceStats>,
}

impl DiscoveryService {
    pub fn new(
        tenants: Arc<dyn TenantDirectory>,
        upstream: Arc<dyn UpstreamClient>,
        cache: Arc<dyn CacheStore>,
        settings: DiscoverySettings,
    ) -> Self {
        Self {
            tenants,
            upstream,
            cache,
            durable: Arc::new(MemoryCacheStore::new(settings.durable_capacity)),
            settings,
            stats: Arc::new(ServiceStats::new()),
        }
    }

    /// Replaces the in-process store for fallback slots and refresh markers
    pub fn with_durable_store(mut self, durable: Arc<dyn CacheStore>) -> Self {
        self.durable = durable;
        self
    }

    pub fn tenants(&self) -> &Arc<dyn TenantDirectory> {
        &self.tenants
    }

    /// Store holding last-known-good slots and refresh markers
    pub fn durable_cache(&self) -> &Arc<dyn CacheStore> {
        &self.durable
    }

    pub fn stats(&self) -> &Arc<ServiceStats> {
        &self.stats
    }

    /// Serves discovery events for `request`, reading through the cache
    pub async fn get_discovery_events(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryResponse, AppError> {
        self.get_discovery_events_at(request, Utc::now()).await
    }

    /// Same as [`get_discovery_events`](Self::get_discovery_events) with an
    /// explicit clock, which decides "today" for past filtering and the
    /// schedule horizon.
    #[instrument(skip(self, request, now), fields(mode = %request.mode, force_fresh = request.force_fresh))]
    pub async fn get_discovery_events_at(
        &self,
        request: &DiscoveryRequest,
        now: DateTime<Utc>,
    ) -> Result<DiscoveryResponse, AppError> {
        if let (Some(start), Some(end)) = (request.start_date, request.end_date)
            && start > end
        {
            return Err(AppError::invalid_request("startDate must not be after endDate"));
        }

        let scope = self.resolve(request).await?;
        let key = cache_key(request.mode, &scope.label, &scope.fingerprint);

        if !request.force_fresh
            && let Some(payload) = self.read_cached(request.mode, &key).await
        {
            debug!("Cache hit for {}", key);
            return Ok(self.respond(request, payload, CacheStatus::Hit, key));
        }

        let today = now.with_timezone(&scope.tz).date_naive();
        let fetched = self
            .collect_events(&scope, today)
            .await
            .map(|collected| self.build_payload(request.mode, &scope, collected, today, now));

        match fetched {
            Ok(payload) => {
                self.write_back(&scope, &key, &payload).await;
                info!(
                    "Fetched fresh {} payload for {} ({})",
                    request.mode, scope.label, key
                );
                Ok(self.respond(request, payload, CacheStatus::Miss, key))
            }
            Err(e) => self.fall_back(request, &scope, key, e).await,
        }
    }

    /// Fetches and buckets a tenant's events without touching the cache
    #[instrument(skip(self, now))]
    pub async fn fetch_schedule_uncached(
        &self,
        slug: &str,
        weeks: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WeekSchedule>, AppError> {
        let scope = self.resolve(&DiscoveryRequest::tenant(slug)).await?;
        let today = now.with_timezone(&scope.tz).date_naive();
        let collected = self.collect_events(&scope, today).await.map_err(|e| {
            error!("Uncached schedule fetch for {} failed: {}", slug, e);
            if e.is_tenant_error() { e } else { AppError::EventsUnavailable }
        })?;
        Ok(build_week_schedule(&collected.events, weeks, today))
    }

    /// Drops every cached payload, fallback slot and refresh marker of a tenant
    pub async fn invalidate_tenant(&self, slug: &str) -> usize {
        let pattern = tenant_pattern(slug);
        let removed = self.cache.delete_by_pattern(&pattern).await
            + self.durable.delete_by_pattern(&pattern).await;
        self.durable.delete(&refresh_marker_key(slug)).await;
        info!("Invalidated {} cache entries for tenant {}", removed, slug);
        removed
    }

    pub async fn clear_all(&self) {
        self.cache.clear().await;
        self.durable.clear().await;
        info!("Cleared discovery cache");
    }

    async fn resolve(&self, request: &DiscoveryRequest) -> Result<ResolvedScope, AppError> {
        let keeps_last_known_good =
            matches!(request.target, DiscoveryTarget::Tenant(_)) && request.facility_id.is_none();
        let (label, organization_ids, facility_ids, api_key, ttl_seconds, tz, branding) =
            match &request.target {
                DiscoveryTarget::Tenant(slug) => {
                    let tenant = self.tenants.get(slug).await?;
                    let api_key = self.tenant_api_key(&tenant)?;
                    let facility_ids = match &request.facility_id {
                        Some(id) => vec![id.clone()],
                        None => tenant.facility_ids.clone(),
                    };
                    (
                        tenant.slug.clone(),
                        tenant.organization_ids.clone(),
                        facility_ids,
                        api_key,
                        tenant
                            .cache_ttl_seconds
                            .unwrap_or(self.settings.default_ttl_seconds),
                        tenant.tz(),
                        tenant.branding.clone(),
                    )
                }
                DiscoveryTarget::Adhoc {
                    organization_ids,
                    api_key,
                } => {
                    if organization_ids.is_empty() {
                        return Err(AppError::invalid_request(
                            "at least one organization id is required",
                        ));
                    }
                    let api_key = api_key
                        .clone()
                        .or_else(|| self.settings.default_api_key.clone())
                        .ok_or_else(|| AppError::invalid_request("apiKey is required"))?;
                    (
                        ADHOC_SCOPE.to_string(),
                        organization_ids.clone(),
                        request.facility_id.iter().cloned().collect(),
                        api_key,
                        self.settings.default_ttl_seconds,
                        Tz::UTC,
                        Branding::default(),
                    )
                }
            };

        let mut organization_ids = organization_ids;
        organization_ids.sort();
        organization_ids.dedup();

        let fingerprint =
            scope_fingerprint(&organization_ids, &facility_ids, &api_key, request.include_past);

        Ok(ResolvedScope {
            label,
            organization_ids,
            facility_ids,
            api_key,
            ttl_seconds,
            tz,
            branding,
            include_past: request.include_past,
            fingerprint,
            keeps_last_known_good,
        })
    }

    fn tenant_api_key(&self, tenant: &TenantConfig) -> Result<String, AppError> {
        tenant
            .api_key
            .clone()
            .or_else(|| self.settings.default_api_key.clone())
            .ok_or_else(|| AppError::tenant_misconfigured(&tenant.slug, "no API key configured"))
    }

    async fn read_cached(&self, mode: Mode, key: &str) -> Option<DiscoveryPayload> {
        match mode {
            Mode::Full => get_json::<FullPayload>(self.cache.as_ref(), key)
                .await
                .map(DiscoveryPayload::Full),
            Mode::Availability => get_json::<AvailabilityPayload>(self.cache.as_ref(), key)
                .await
                .map(DiscoveryPayload::Availability),
        }
    }

    /// Fetches every organization concurrently. A failed organization
    /// contributes no events; all of them failing is an error.
    async fn collect_events(
        &self,
        scope: &ResolvedScope,
        today: NaiveDate,
    ) -> Result<CollectedEvents, AppError> {
        if scope.organization_ids.is_empty() {
            return Err(AppError::tenant_misconfigured(
                &scope.label,
                "no organizations configured",
            ));
        }

        let query = ProgramQuery::new(scope.api_key.clone(), scope.facility_ids.clone());
        let fetch_futures = scope
            .organization_ids
            .iter()
            .map(|org_id| self.fetch_organization(org_id, &query));

        // join_all keeps input order, so the merge below is independent of completion order
        let results = join_all(fetch_futures).await;

        let mut batches = Vec::with_capacity(results.len());
        let mut total_programs = 0;
        let mut failed_organizations = Vec::new();

        for (org_id, result) in scope.organization_ids.iter().zip(results) {
            match result {
                Ok(programs) => {
                    total_programs += programs.len();
                    let ctx = FlattenContext {
                        organization_id: org_id,
                        default_tz: scope.tz,
                        branding: &scope.branding,
                        facility_ids: &scope.facility_ids,
                        include_past: scope.include_past,
                        today,
                    };
                    batches.push(flatten_programs(&programs, &ctx));
                }
                Err(e) => {
                    warn!(
                        organization_id = %org_id,
                        scope = %scope.label,
                        "Organization fetch failed, contributing no events: {}",
                        e
                    );
                    failed_organizations.push(org_id.clone());
                }
            }
        }

        if failed_organizations.len() == scope.organization_ids.len() {
            return Err(AppError::upstream_unavailable(&scope.label));
        }

        let events = merge_events(batches);
        info!(
            "Collected {} events from {} organizations for {} ({} failed)",
            events.len(),
            scope.organization_ids.len(),
            scope.label,
            failed_organizations.len()
        );

        Ok(CollectedEvents {
            events,
            total_programs,
            failed_organizations,
        })
    }

    async fn fetch_organization(
        &self,
        org_id: &str,
        query: &ProgramQuery,
    ) -> Result<Vec<Program>, AppError> {
        let started = Instant::now();
        let result = self.upstream.get_programs(org_id, query).await;
        self.stats
            .record_upstream_call(started.elapsed(), result.is_ok());
        result
    }

    fn build_payload(
        &self,
        mode: Mode,
        scope: &ResolvedScope,
        collected: CollectedEvents,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> DiscoveryPayload {
        match mode {
            Mode::Availability => {
                DiscoveryPayload::Availability(availability_from_events(&collected.events))
            }
            Mode::Full => {
                let schedule =
                    build_week_schedule(&collected.events, self.settings.schedule_weeks, today);
                DiscoveryPayload::Full(FullPayload {
                    meta: PayloadMeta {
                        total_events: collected.events.len(),
                        total_programs: collected.total_programs,
                        organization_count: scope.organization_ids.len(),
                        failed_organizations: collected.failed_organizations,
                        cached_at: now,
                        weeks: self.settings.schedule_weeks,
                    },
                    data: collected.events,
                    schedule,
                })
            }
        }
    }

    async fn write_back(&self, scope: &ResolvedScope, key: &str, payload: &DiscoveryPayload) {
        let store = self.cache.as_ref();
        match payload {
            DiscoveryPayload::Full(full) => {
                set_json(store, key, full, scope.ttl_seconds).await;
                if scope.keeps_last_known_good {
                    let lkg_key = last_known_good_key(&scope.label, &scope.fingerprint);
                    set_json(
                        self.durable.as_ref(),
                        &lkg_key,
                        full,
                        self.settings.last_known_good_ttl_seconds,
                    )
                    .await;
                }
            }
            DiscoveryPayload::Availability(overlay) => {
                set_json(store, key, overlay, scope.ttl_seconds).await;
            }
        }
    }

    async fn fall_back(
        &self,
        request: &DiscoveryRequest,
        scope: &ResolvedScope,
        key: String,
        cause: AppError,
    ) -> Result<DiscoveryResponse, AppError> {
        let lkg_key = last_known_good_key(&scope.label, &scope.fingerprint);
        if let Some(last_good) = get_json::<FullPayload>(self.durable.as_ref(), &lkg_key).await {
            warn!(
                "Serving last known good payload for {} from {}: {}",
                scope.label, last_good.meta.cached_at, cause
            );
            let payload = match request.mode {
                Mode::Full => DiscoveryPayload::Full(last_good),
                Mode::Availability => {
                    DiscoveryPayload::Availability(availability_from_events(&last_good.data))
                }
            };
            return Ok(self.respond(request, payload, CacheStatus::Stale, key));
        }

        error!(
            "Failed to fetch events for {} with no fallback available: {}",
            scope.label, cause
        );
        if cause.is_tenant_error() {
            Err(cause)
        } else {
            Err(AppError::EventsUnavailable)
        }
    }

    fn respond(
        &self,
        request: &DiscoveryRequest,
        payload: DiscoveryPayload,
        cache_status: CacheStatus,
        cache_key: String,
    ) -> DiscoveryResponse {
        self.stats.record_status(cache_status);
        let payload = match payload {
            DiscoveryPayload::Full(full) => {
                DiscoveryPayload::Full(full.filter_dates(request.start_date, request.end_date))
            }
            // overlays are keyed by event id only
            availability => availability,
        };
        DiscoveryResponse {
            payload,
            cache_status,
            cache_key,
        }
    }
}
