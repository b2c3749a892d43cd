pub mod cache_keys;
pub mod flatten;
pub mod models;
pub mod orchestrator;
pub mod refresh_policy;
pub mod schedule;
pub mod stats;
pub mod warming;

pub use cache_keys::{cache_key, last_known_good_key, refresh_marker_key, scope_fingerprint};
pub use flatten::{FlattenContext, flatten_programs, merge_events, registration_link};
pub use models::{
    Availability, AvailabilityPayload, CacheStatus, CalendarEvent, DaySchedule, DiscoveryPayload,
    FullPayload, Mode, PayloadMeta, WeekSchedule,
};
pub use orchestrator::{
    DiscoveryRequest, DiscoveryResponse, DiscoveryService, DiscoverySettings, DiscoveryTarget,
};
pub use refresh_policy::should_refresh;
pub use schedule::{build_month_schedule, build_week_schedule, week_start};
pub use stats::{ServiceStats, StatsSnapshot};
pub use warming::{
    InFlightTracker, WarmDetail, WarmStatus, WarmingScheduler, WarmingSummary, spawn_warming_loop,
};
