use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::models::CacheStatus;

/// Counters describing how requests were served
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub upstream_call_count: u64,
    pub upstream_failure_count: u64,
    pub cache_hit_count: u64,
    pub cache_miss_count: u64,
    pub stale_served_count: u64,
    pub average_upstream_ms: f64,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            upstream_call_count: 0,
            upstream_failure_count: 0,
            cache_hit_count: 0,
            cache_miss_count: 0,
            stale_served_count: 0,
            average_upstream_ms: 0.0,
            started_at: Instant::now(),
        }
    }

    pub fn record_upstream_call(&mut self, response_time: Duration, succeeded: bool) {
        self.upstream_call_count += 1;
        if !succeeded {
            self.upstream_failure_count += 1;
        }
        let response_time_ms = response_time.as_millis() as f64;

        // Rolling average
        self.average_upstream_ms = if self.upstream_call_count == 1 {
            response_time_ms
        } else {
            (self.average_upstream_ms * (self.upstream_call_count - 1) as f64 + response_time_ms)
                / self.upstream_call_count as f64
        };
    }

    pub fn record_status(&mut self, status: CacheStatus) {
        match status {
            CacheStatus::Hit => self.cache_hit_count += 1,
            CacheStatus::Miss => self.cache_miss_count += 1,
            CacheStatus::Stale => self.stale_served_count += 1,
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hit_count + self.cache_miss_count + self.stale_served_count;
        if total == 0 {
            0.0
        } else {
            self.cache_hit_count as f64 / total as f64
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub stale_served: u64,
    pub cache_hit_rate: f64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub average_upstream_ms: f64,
    pub uptime_seconds: u64,
}

/// Thread-safe wrapper shared by the orchestrator and the health route
#[derive(Debug, Default)]
pub struct ServiceStats {
    metrics: Mutex<ServiceMetrics>,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_metrics<R>(&self, f: impl FnOnce(&mut ServiceMetrics) -> R) -> R {
        let mut metrics = self
            .metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut metrics)
    }

    pub fn record_upstream_call(&self, response_time: Duration, succeeded: bool) {
        self.with_metrics(|m| m.record_upstream_call(response_time, succeeded));
    }

    pub fn record_status(&self, status: CacheStatus) {
        self.with_metrics(|m| m.record_status(status));
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.with_metrics(|m| StatsSnapshot {
            cache_hits: m.cache_hit_count,
            cache_misses: m.cache_miss_count,
            stale_served: m.stale_served_count,
            cache_hit_rate: m.cache_hit_rate(),
            upstream_calls: m.upstream_call_count,
            upstream_failures: m.upstream_failure_count,
            average_upstream_ms: m.average_upstream_ms,
            uptime_seconds: m.started_at.elapsed().as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics() {
        let mut metrics = ServiceMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);

        metrics.record_upstream_call(Duration::from_millis(100), true);
        metrics.record_upstream_call(Duration::from_millis(200), false);
        assert_eq!(metrics.upstream_call_count, 2);
        assert_eq!(metrics.upstream_failure_count, 1);
        assert_eq!(metrics.average_upstream_ms, 150.0);

        metrics.record_status(CacheStatus::Hit);
        metrics.record_status(CacheStatus::Hit);
        metrics.record_status(CacheStatus::Hit);
        metrics.record_status(CacheStatus::Miss);
        assert_eq!(metrics.cache_hit_rate(), 0.75);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = ServiceStats::new();
        stats.record_status(CacheStatus::Stale);
        stats.record_upstream_call(Duration::from_millis(40), true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.stale_served, 1);
        assert_eq!(snapshot.upstream_calls, 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["staleServed"], 1);
    }
}
