//! Week and month bucketing of calendar events

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashMap;

use super::flatten::sort_events;
use super::models::{CalendarEvent, DaySchedule, WeekSchedule};
use crate::error::AppError;

/// Most recent Sunday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn index_by_date(events: &[CalendarEvent]) -> HashMap<NaiveDate, Vec<CalendarEvent>> {
    let mut index: HashMap<NaiveDate, Vec<CalendarEvent>> = HashMap::new();
    for event in events {
        index.entry(event.date).or_default().push(event.clone());
    }
    for day_events in index.values_mut() {
        sort_events(day_events);
    }
    index
}

fn build_weeks(
    index: &mut HashMap<NaiveDate, Vec<CalendarEvent>>,
    first_week_start: NaiveDate,
    weeks: i64,
) -> Vec<WeekSchedule> {
    (0..weeks)
        .map(|week| {
            let start = first_week_start + Duration::weeks(week);
            let days = (0..7)
                .map(|offset| {
                    let date = start + Duration::days(offset);
                    DaySchedule {
                        date,
                        events: index.remove(&date).unwrap_or_default(),
                    }
                })
                .collect();
            WeekSchedule {
                week_start: start,
                days,
            }
        })
        .collect()
}

/// Buckets events into `weeks` Sunday-first weeks, the first containing `today`.
///
/// Events are placed by their local `date`. Events outside the horizon are
/// left out; `weeks <= 0` yields no weeks.
pub fn build_week_schedule(events: &[CalendarEvent], weeks: i64, today: NaiveDate) -> Vec<WeekSchedule> {
    if weeks <= 0 {
        return Vec::new();
    }
    let mut index = index_by_date(events);
    build_weeks(&mut index, week_start(today), weeks)
}

/// Sunday-first weeks covering every day of the given month
pub fn build_month_schedule(
    events: &[CalendarEvent],
    year: i32,
    month: u32,
) -> Result<Vec<WeekSchedule>, AppError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::invalid_request(format!("invalid month {year}-{month}")))?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::invalid_request(format!("invalid month {year}-{month}")))?;
    let last = next_month - Duration::days(1);

    let first_week = week_start(first);
    let weeks = (week_start(last) - first_week).num_weeks() + 1;

    let mut index = index_by_date(events);
    Ok(build_weeks(&mut index, first_week, weeks))
}
