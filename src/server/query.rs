//! Query-string parsing for the discovery routes

use chrono::NaiveDate;
use serde::Deserialize;

use crate::constants::{DEFAULT_SCHEDULE_WEEKS, MAX_SCHEDULE_WEEKS};
use crate::discovery::{DiscoveryRequest, Mode};
use crate::error::AppError;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub slug: Option<String>,
    pub org_ids: Option<String>,
    pub api_key: Option<String>,
    pub facility_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub include_past: Option<String>,
    pub mode: Option<String>,
    pub fresh: Option<String>,
    pub bypass: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ScheduleQuery {
    pub slug: Option<String>,
    pub weeks: Option<String>,
}

/// Lenient boolean: `1`, `true`, `yes` and `on` are true
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Splits a comma- or underscore-separated id list
pub fn parse_org_ids(raw: &str) -> Result<Vec<String>, AppError> {
    let ids: Vec<String> = raw
        .split([',', '_'])
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err(AppError::invalid_request("orgIds must list at least one id"));
    }
    if let Some(bad) = ids
        .iter()
        .find(|id| !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
    {
        return Err(AppError::invalid_request(format!("invalid organization id '{bad}'")));
    }
    Ok(ids)
}

fn parse_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::invalid_request(format!("{name} must be YYYY-MM-DD"))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl EventsQuery {
    /// Builds the orchestrator request. A slug takes precedence over `orgIds`.
    pub fn into_request(self) -> Result<DiscoveryRequest, AppError> {
        let request = match (non_empty(self.slug), non_empty(self.org_ids)) {
            (Some(slug), _) => DiscoveryRequest::tenant(slug),
            (None, Some(org_ids)) => {
                DiscoveryRequest::adhoc(parse_org_ids(&org_ids)?, non_empty(self.api_key))
            }
            (None, None) => return Err(AppError::invalid_request("slug or orgIds is required")),
        };

        let mode = match non_empty(self.mode) {
            Some(mode) => mode.parse::<Mode>()?,
            None => Mode::Full,
        };

        let mut request = request
            .with_mode(mode)
            .with_dates(
                parse_date("startDate", self.start_date.as_deref())?,
                parse_date("endDate", self.end_date.as_deref())?,
            )
            .with_include_past(parse_flag(self.include_past.as_deref()))
            .with_force_fresh(
                parse_flag(self.fresh.as_deref()) || parse_flag(self.bypass.as_deref()),
            );
        if let Some(facility_id) = non_empty(self.facility_id) {
            request = request.with_facility(facility_id);
        }
        Ok(request)
    }
}

impl ScheduleQuery {
    /// Tenant slug and week count, clamped to the supported horizon
    pub fn parse(self) -> Result<(String, i64), AppError> {
        let slug = non_empty(self.slug).ok_or_else(|| AppError::invalid_request("slug is required"))?;
        let weeks = match non_empty(self.weeks) {
            None => DEFAULT_SCHEDULE_WEEKS,
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| AppError::invalid_request("weeks must be an integer"))?,
        };
        Ok((slug, weeks.min(MAX_SCHEDULE_WEEKS)))
    }
}
