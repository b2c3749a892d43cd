//! Tenant configuration and the directory that resolves tenants by slug

use async_trait::async_trait;
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

use crate::error::AppError;

/// How often the warming scheduler refreshes a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RefreshInterval {
    #[serde(rename = "5min")]
    FiveMinutes,
    #[default]
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "60min")]
    SixtyMinutes,
}

impl RefreshInterval {
    pub fn minutes(self) -> i64 {
        match self {
            RefreshInterval::FiveMinutes => 5,
            RefreshInterval::FifteenMinutes => 15,
            RefreshInterval::ThirtyMinutes => 30,
            RefreshInterval::SixtyMinutes => 60,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }
}

/// Display and linking options applied to every event of a tenant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    /// Hex color attached to events for calendar rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Registration URL with `{org_id}`, `{program_id}` and `{session_id}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_url_template: Option<String>,
}

/// A configured discovery page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub slug: String,
    #[serde(default)]
    pub organization_ids: Vec<String>,
    #[serde(default)]
    pub facility_ids: Vec<String>,
    /// Falls back to the service-wide default key when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
    #[serde(default)]
    pub refresh_interval: RefreshInterval,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// IANA zone used to derive local event dates
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub branding: Branding,
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl TenantConfig {
    /// Creates an active, cache-enabled tenant with default settings
    pub fn new(slug: impl Into<String>, organization_ids: Vec<String>) -> Self {
        Self {
            slug: slug.into(),
            organization_ids,
            facility_ids: Vec::new(),
            api_key: None,
            cache_ttl_seconds: None,
            refresh_interval: RefreshInterval::default(),
            cache_enabled: true,
            is_active: true,
            timezone: default_timezone(),
            branding: Branding::default(),
        }
    }

    /// Resolves the configured time zone, falling back to UTC for unknown names.
    /// Names are checked by config validation, so the fallback only covers
    /// tenants supplied by other directories.
    pub fn tz(&self) -> Tz {
        Tz::from_str(&self.timezone).unwrap_or_else(|_| {
            warn!(
                "Unknown time zone '{}' for tenant {}, using UTC",
                self.timezone, self.slug
            );
            Tz::UTC
        })
    }
}

/// Resolves tenant configuration. The relational store behind the admin
/// console implements this in production; the service ships a static
/// implementation backed by the config file.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Look up a tenant by slug
    async fn get(&self, slug: &str) -> Result<TenantConfig, AppError>;

    /// All tenants with `is_active` set
    async fn list_active(&self) -> Result<Vec<TenantConfig>, AppError>;
}

/// Tenant directory backed by an in-memory list
pub struct StaticTenantDirectory {
    tenants: HashMap<String, TenantConfig>,
    order: Vec<String>,
}

impl StaticTenantDirectory {
    pub fn new(tenants: Vec<TenantConfig>) -> Self {
        let order = tenants.iter().map(|t| t.slug.clone()).collect();
        let tenants = tenants.into_iter().map(|t| (t.slug.clone(), t)).collect();
        Self { tenants, order }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn get(&self, slug: &str) -> Result<TenantConfig, AppError> {
        self.tenants
            .get(slug)
            .filter(|t| t.is_active)
            .cloned()
            .ok_or_else(|| AppError::tenant_not_found(slug))
    }

    async fn list_active(&self) -> Result<Vec<TenantConfig>, AppError> {
        Ok(self
            .order
            .iter()
            .filter_map(|slug| self.tenants.get(slug))
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }
}
