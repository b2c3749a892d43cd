use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// One occurrence of a program session, flattened from the upstream tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub program_id: String,
    pub program_name: Option<String>,
    pub session_id: String,
    pub session_name: Option<String>,
    pub facility_id: Option<String>,
    pub facility_name: Option<String>,
    pub organization_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Local calendar day of `start`, used for day bucketing
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub spots_remaining: Option<i64>,
    pub capacity: Option<i64>,
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub events: Vec<CalendarEvent>,
}

/// Seven consecutive days starting on a Sunday
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSchedule {
    pub week_start: NaiveDate,
    pub days: Vec<DaySchedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub total_events: usize,
    pub total_programs: usize,
    pub organization_count: usize,
    /// Organizations whose fetch failed and contributed no events
    #[serde(default)]
    pub failed_organizations: Vec<String>,
    pub cached_at: DateTime<Utc>,
    pub weeks: i64,
}

/// Complete event list plus week schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullPayload {
    pub data: Vec<CalendarEvent>,
    pub schedule: Vec<WeekSchedule>,
    pub meta: PayloadMeta,
}

impl FullPayload {
    /// Restricts events to the inclusive `[start, end]` date range. Days
    /// outside the range keep their slot in the schedule but lose their events.
    pub fn filter_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        if start.is_none() && end.is_none() {
            return self;
        }
        let in_range = |date: NaiveDate| {
            start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
        };

        self.data.retain(|event| in_range(event.date));
        for week in &mut self.schedule {
            for day in &mut week.days {
                if !in_range(day.date) {
                    day.events.clear();
                }
            }
        }
        self.meta.total_events = self.data.len();
        self
    }
}

/// Capacity and price of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub spots_remaining: Option<i64>,
    pub capacity: Option<i64>,
    pub price: Option<f64>,
}

/// Event id → availability, for frequent polling
pub type AvailabilityPayload = BTreeMap<String, Availability>;

pub fn availability_from_events(events: &[CalendarEvent]) -> AvailabilityPayload {
    events
        .iter()
        .map(|event| {
            (
                event.id.clone(),
                Availability {
                    spots_remaining: event.spots_remaining,
                    capacity: event.capacity,
                    price: event.price,
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiscoveryPayload {
    Full(FullPayload),
    Availability(AvailabilityPayload),
}

impl DiscoveryPayload {
    pub fn as_full(&self) -> Option<&FullPayload> {
        match self {
            DiscoveryPayload::Full(payload) => Some(payload),
            DiscoveryPayload::Availability(_) => None,
        }
    }

    pub fn as_availability(&self) -> Option<&AvailabilityPayload> {
        match self {
            DiscoveryPayload::Availability(payload) => Some(payload),
            DiscoveryPayload::Full(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Full,
    Availability,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Full => "full",
            Mode::Availability => "availability",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Mode::Full),
            "availability" => Ok(Mode::Availability),
            other => Err(AppError::invalid_request(format!("unknown mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Stale => "stale",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str, date: NaiveDate) -> CalendarEvent {
        let start = Utc
            .from_local_datetime(&date.and_hms_opt(18, 0, 0).unwrap())
            .unwrap();
        CalendarEvent {
            id: id.to_string(),
            title: "Open Gym".to_string(),
            program_id: "p".to_string(),
            program_name: None,
            session_id: "s".to_string(),
            session_name: None,
            facility_id: None,
            facility_name: None,
            organization_id: "10".to_string(),
            start,
            end: start,
            date,
            color: None,
            spots_remaining: Some(3),
            capacity: Some(12),
            price: Some(15.0),
            registration_url: None,
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("full".parse::<Mode>().unwrap(), Mode::Full);
        assert_eq!("Availability".parse::<Mode>().unwrap(), Mode::Availability);
        assert!("weekly".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Full);
    }

    #[test]
    fn test_calendar_event_serializes_camel_case() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let value = serde_json::to_value(event("1", date)).unwrap();
        assert_eq!(value["date"], "2024-01-15");
        assert_eq!(value["spotsRemaining"], 3);
        assert_eq!(value["organizationId"], "10");
        assert!(value.get("color").is_none());
    }

    #[test]
    fn test_availability_from_events() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let overlay = availability_from_events(&[event("a", date), event("b", date)]);
        assert_eq!(overlay.len(), 2);
        assert_eq!(overlay["a"].capacity, Some(12));

        let json = serde_json::to_value(&overlay).unwrap();
        assert_eq!(json["b"]["spotsRemaining"], 3);
    }

    #[test]
    fn test_filter_dates() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let payload = FullPayload {
            data: vec![event("a", d1), event("b", d2)],
            schedule: vec![WeekSchedule {
                week_start: d1,
                days: vec![
                    DaySchedule { date: d1, events: vec![event("a", d1)] },
                    DaySchedule { date: d2, events: vec![event("b", d2)] },
                ],
            }],
            meta: PayloadMeta {
                total_events: 2,
                total_programs: 1,
                organization_count: 1,
                failed_organizations: vec![],
                cached_at: Utc::now(),
                weeks: 1,
            },
        };

        let filtered = payload.filter_dates(Some(d2), None);
        assert_eq!(filtered.data.len(), 1);
        assert_eq!(filtered.data[0].id, "b");
        assert!(filtered.schedule[0].days[0].events.is_empty());
        assert_eq!(filtered.schedule[0].days[1].events.len(), 1);
        assert_eq!(filtered.meta.total_events, 1);
    }
}
