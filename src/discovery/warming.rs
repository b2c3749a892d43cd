//! Background warming of tenant caches ahead of user traffic

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore, watch};
use tracing::{debug, error, info, instrument, warn};

use super::models::{CacheStatus, Mode};
use super::orchestrator::{DiscoveryRequest, DiscoveryService};
use super::refresh_policy::{mark_refreshed, read_last_refreshed, should_refresh};
use crate::config::{TenantConfig, WarmingConfig};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmStatus {
    Warmed,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmDetail {
    pub slug: String,
    pub status: WarmStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_events: Option<usize>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WarmDetail {
    fn skipped(slug: &str, reason: &str) -> Self {
        Self {
            slug: slug.to_string(),
            status: WarmStatus::Skipped,
            total_events: None,
            duration_ms: 0,
            reason: Some(reason.to_string()),
        }
    }

    fn failed(slug: &str, duration_ms: u64, reason: String) -> Self {
        Self {
            slug: slug.to_string(),
            status: WarmStatus::Error,
            total_events: None,
            duration_ms,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmingSummary {
    pub total_active: usize,
    pub warmed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub elapsed_ms: u64,
    pub details: Vec<WarmDetail>,
}

/// Counts refreshes in flight and remembers the highest count seen
#[derive(Debug, Default)]
pub struct InFlightTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightTracker {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { tracker: self }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a> {
    tracker: &'a InFlightTracker,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tracker.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Refreshes due tenants through a fixed pool of workers.
///
/// Only one run is active at a time; a run that starts while another is in
/// progress reports every tenant as skipped. Refreshes are admitted through a
/// semaphore sized to the concurrency ceiling.
pub struct WarmingScheduler {
    service: Arc<DiscoveryService>,
    concurrency: usize,
    run_budget: Duration,
    in_flight: Arc<InFlightTracker>,
    permits: Semaphore,
    run_lock: Mutex<()>,
}

impl WarmingScheduler {
    pub fn new(service: Arc<DiscoveryService>, config: &WarmingConfig) -> Self {
        Self {
            service,
            concurrency: config.concurrency.max(1),
            run_budget: Duration::from_secs(config.run_budget_seconds),
            in_flight: Arc::new(InFlightTracker::default()),
            permits: Semaphore::new(config.concurrency.max(1)),
            run_lock: Mutex::new(()),
        }
    }

    pub fn in_flight(&self) -> Arc<InFlightTracker> {
        Arc::clone(&self.in_flight)
    }

    pub async fn run(&self) -> Result<WarmingSummary, AppError> {
        self.run_at(Utc::now()).await
    }

    /// One warming pass. Per-tenant failures are recorded in the summary;
    /// only a failure to list tenants fails the run.
    #[instrument(skip(self, now))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<WarmingSummary, AppError> {
        let started = Instant::now();
        let Ok(_run) = self.run_lock.try_lock() else {
            return self.overlapping_run(started).await;
        };
        let active = self.service.tenants().list_active().await?;
        let total_active = active.len();

        let mut details = Vec::with_capacity(total_active);
        let mut due = VecDeque::new();
        for tenant in active {
            if !tenant.cache_enabled {
                details.push(WarmDetail::skipped(&tenant.slug, "cache disabled"));
                continue;
            }
            let markers = self.service.durable_cache().as_ref();
            let last = read_last_refreshed(markers, &tenant.slug).await;
            if should_refresh(last, tenant.refresh_interval, now) {
                due.push_back(tenant);
            } else {
                debug!("Tenant {} refreshed recently, skipping", tenant.slug);
                details.push(WarmDetail::skipped(&tenant.slug, "not due"));
            }
        }

        info!(
            "Warming {} of {} active tenants with {} workers",
            due.len(),
            total_active,
            self.concurrency
        );

        let worker_count = self.concurrency.min(due.len());
        let queue = Mutex::new(due);
        let results = Mutex::new(Vec::new());

        let workers = (0..worker_count).map(|_| async {
            loop {
                let next = queue.lock().await.pop_front();
                let Some(tenant) = next else { break };
                let detail = self.refresh_tenant(&tenant, now).await;
                results.lock().await.push(detail);
            }
        });
        join_all(workers).await;

        details.extend(results.into_inner());
        details.sort_by(|a, b| a.slug.cmp(&b.slug));

        let count = |status| details.iter().filter(|d| d.status == status).count();
        let elapsed = started.elapsed();
        let summary = WarmingSummary {
            total_active,
            warmed: count(WarmStatus::Warmed),
            skipped: count(WarmStatus::Skipped),
            errored: count(WarmStatus::Error),
            elapsed_ms: elapsed.as_millis() as u64,
            details,
        };

        if elapsed > self.run_budget {
            warn!(
                "Warming run took {:?}, over its {:?} budget",
                elapsed, self.run_budget
            );
        }
        info!(
            "Warming run finished: {} warmed, {} skipped, {} errored in {}ms",
            summary.warmed, summary.skipped, summary.errored, summary.elapsed_ms
        );
        Ok(summary)
    }

    async fn overlapping_run(&self, started: Instant) -> Result<WarmingSummary, AppError> {
        warn!("Warming run already in progress, skipping this one");
        let details: Vec<_> = self
            .service
            .tenants()
            .list_active()
            .await?
            .iter()
            .map(|tenant| WarmDetail::skipped(&tenant.slug, "run in progress"))
            .collect();
        Ok(WarmingSummary {
            total_active: details.len(),
            warmed: 0,
            skipped: details.len(),
            errored: 0,
            elapsed_ms: started.elapsed().as_millis() as u64,
            details,
        })
    }

    /// Forces a full then an availability refresh. The refresh marker moves
    /// only when both produced fresh data.
    async fn refresh_tenant(&self, tenant: &TenantConfig, now: DateTime<Utc>) -> WarmDetail {
        let started = Instant::now();
        let Ok(_permit) = self.permits.acquire().await else {
            return WarmDetail::failed(&tenant.slug, 0, "warming stopped".to_string());
        };
        let _guard = self.in_flight.enter();

        let outcome = self.refresh_both_modes(&tenant.slug, now).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(total_events) => {
                mark_refreshed(self.service.durable_cache().as_ref(), &tenant.slug, now).await;
                debug!("Warmed tenant {} ({} events)", tenant.slug, total_events);
                WarmDetail {
                    slug: tenant.slug.clone(),
                    status: WarmStatus::Warmed,
                    total_events: Some(total_events),
                    duration_ms,
                    reason: None,
                }
            }
            Err(e) => {
                error!(slug = %tenant.slug, "Warming tenant failed: {}", e);
                WarmDetail::failed(&tenant.slug, duration_ms, e.public_message())
            }
        }
    }

    async fn refresh_both_modes(&self, slug: &str, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut total_events = 0;
        for mode in [Mode::Full, Mode::Availability] {
            let request = DiscoveryRequest::tenant(slug)
                .with_mode(mode)
                .with_force_fresh(true);
            let response = self.service.get_discovery_events_at(&request, now).await?;
            if response.cache_status == CacheStatus::Stale {
                return Err(AppError::EventsUnavailable);
            }
            if let Some(full) = response.payload.as_full() {
                total_events = full.meta.total_events;
            }
        }
        Ok(total_events)
    }
}

/// Runs a warming pass every `interval` until `shutdown` flips to true
pub fn spawn_warming_loop(
    scheduler: Arc<WarmingScheduler>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Warming loop started, interval {:?}", interval);
        loop {
            if *shutdown.borrow() {
                info!("Warming loop shutting down");
                return;
            }

            if let Err(e) = scheduler.run().await {
                error!("Warming run failed: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Warming loop shutdown sender dropped, stopping");
                        return;
                    }
                }
            }
        }
    })
}
