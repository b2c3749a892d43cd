//! Application-wide constants and configuration values
//!
//! This module centralizes all magic numbers and configuration constants
//! to improve maintainability and make the codebase more configurable.

/// Default timeout for upstream HTTP requests in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 20;

/// Maximum number of connections per host in the HTTP client pool
pub const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 32;

/// Default address the HTTP service binds to
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Default number of weeks in a built schedule
pub const DEFAULT_SCHEDULE_WEEKS: i64 = 4;

/// Upper bound accepted for the `weeks` query parameter
pub const MAX_SCHEDULE_WEEKS: i64 = 26;

/// Relationships requested from the upstream programs endpoint
pub const PROGRAM_EXPAND: &str = "sessions,sessions.events,sessions.segments,sessions.facility";

/// Scope label used in cache keys for requests that name organizations directly
pub const ADHOC_SCOPE: &str = "adhoc";

/// Cache TTL (Time To Live) values in seconds
pub mod cache_ttl {
    /// TTL for discovery payloads when the tenant does not configure one (5 minutes)
    pub const DEFAULT_SECONDS: u64 = 300;

    /// TTL for the last-known-good full payload (3 days)
    pub const LAST_KNOWN_GOOD_SECONDS: u64 = 3 * 24 * 60 * 60;

    /// TTL for the last-refreshed marker written by the warming scheduler (7 days)
    pub const REFRESH_MARKER_SECONDS: u64 = 7 * 24 * 60 * 60;

    /// Capacity of the in-process cache
    pub const MEMORY_MAX_ENTRIES: usize = 500;

    /// Capacity of the in-process store holding fallback slots and refresh markers
    pub const DURABLE_MAX_ENTRIES: usize = 1000;
}

/// Cache-Control directives sent with discovery responses
pub mod cache_control {
    /// Availability payloads are polled frequently
    pub const AVAILABILITY: &str = "public, max-age=20, stale-while-revalidate=40";

    /// Full payloads change slowly
    pub const FULL: &str = "public, max-age=60, stale-while-revalidate=300";

    /// Responses that must never be stored by intermediaries
    pub const NO_STORE: &str = "no-store";
}

/// Response header names used for observability
pub mod headers {
    pub const CACHE_STATUS: &str = "x-discovery-cache";
    pub const MODE: &str = "x-discovery-mode";
    pub const CACHE_KEY: &str = "x-discovery-cache-key";
}

/// Cache warming defaults
pub mod warming {
    /// At most this many tenants are refreshed at once
    pub const DEFAULT_CONCURRENCY: usize = 2;

    /// Interval of the in-process warming loop (5 minutes)
    pub const DEFAULT_INTERVAL_SECONDS: u64 = 300;

    /// Wall-clock budget for a single warming run
    pub const DEFAULT_RUN_BUDGET_SECONDS: u64 = 240;
}

/// Environment variable names
pub mod env_vars {
    /// Path to the configuration file
    pub const CONFIG_PATH: &str = "DISCOVERY_CONFIG";

    /// Environment variable for API domain override
    pub const API_DOMAIN: &str = "DISCOVERY_API_DOMAIN";

    /// Environment variable for log file path override
    pub const LOG_FILE: &str = "DISCOVERY_LOG_FILE";

    /// Environment variable for upstream HTTP timeout in seconds
    pub const HTTP_TIMEOUT: &str = "DISCOVERY_HTTP_TIMEOUT";

    /// Environment variable for the bind address
    pub const LISTEN_ADDR: &str = "DISCOVERY_LISTEN_ADDR";

    /// Shared secret for the warming trigger and cache administration
    pub const CRON_SECRET: &str = "DISCOVERY_CRON_SECRET";

    /// Base URL of the remote key-value cache
    pub const CACHE_URL: &str = "DISCOVERY_CACHE_URL";

    /// Bearer token of the remote key-value cache
    pub const CACHE_TOKEN: &str = "DISCOVERY_CACHE_TOKEN";
}

/// Retry configuration for upstream calls
pub mod retry {
    /// Maximum number of retries after the first attempt
    pub const MAX_RETRIES: u32 = 2;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 250;
}
