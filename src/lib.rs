//! Discovery events aggregation and caching
//!
//! Fetches program sessions for a tenant's organizations from the
//! sports-management API, flattens them into calendar events, buckets them
//! into week schedules and keeps the results in a cache with a
//! last-known-good fallback. A warming scheduler refreshes tenants ahead of
//! user traffic.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use discovery_events::cache::MemoryCacheStore;
//! use discovery_events::config::{StaticTenantDirectory, TenantConfig};
//! use discovery_events::discovery::{DiscoveryRequest, DiscoveryService, DiscoverySettings};
//! use discovery_events::upstream::HttpUpstreamClient;
//! use discovery_events::error::AppError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let mut tenant = TenantConfig::new("acme", vec!["10".to_string(), "20".to_string()]);
//!     tenant.api_key = Some("api-key".to_string());
//!
//!     let service = DiscoveryService::new(
//!         Arc::new(StaticTenantDirectory::new(vec![tenant])),
//!         Arc::new(HttpUpstreamClient::with_timeout("https://api.example.com", 20)?),
//!         Arc::new(MemoryCacheStore::new(500)),
//!         DiscoverySettings::default(),
//!     );
//!
//!     let response = service.get_discovery_events(&DiscoveryRequest::tenant("acme")).await?;
//!     println!("{} ({})", response.cache_key, response.cache_status);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod server;
pub mod testing_utils;
pub mod upstream;

// Re-export commonly used types for convenience
pub use config::Config;
pub use discovery::{
    CacheStatus, CalendarEvent, DiscoveryRequest, DiscoveryResponse, DiscoveryService, Mode,
    WarmingScheduler, WeekSchedule,
};
pub use error::AppError;

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
