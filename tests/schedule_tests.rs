//! Schedule invariants over flattened upstream data

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use discovery_events::config::Branding;
use discovery_events::discovery::{
    CalendarEvent, FlattenContext, build_month_schedule, build_week_schedule, flatten_programs,
    merge_events,
};
use discovery_events::testing_utils::TestDataBuilder;
use std::collections::HashMap;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Events spread over several organizations and zones, with overlaps
fn sample_events(today: NaiveDate) -> Vec<CalendarEvent> {
    let branding = Branding::default();
    let evening = TestDataBuilder::program("1", "Evening League")
        .session(
            TestDataBuilder::session("11", "West Coast")
                .facility("3", "Pier Gym", Some("America/Los_Angeles"))
                // 05:30 UTC on the 18th is the evening of the 17th in Los Angeles
                .event("late", "2024-01-18T05:30:00Z", "2024-01-18T07:00:00Z")
                .event("same-time-b", "2024-01-20T17:00:00Z", "2024-01-20T18:00:00Z")
                .event("same-time-a", "2024-01-20T17:00:00Z", "2024-01-20T18:00:00Z"),
        )
        .build();
    let mut batches = vec![flatten_programs(
        &[evening],
        &FlattenContext {
            organization_id: "10",
            default_tz: Tz::UTC,
            branding: &branding,
            facility_ids: &[],
            include_past: false,
            today,
        },
    )];
    for (org, prefix, first) in [("20", "b", "2024-01-15"), ("30", "c", "2024-01-25"), ("40", "b", "2024-01-15")] {
        batches.push(flatten_programs(
            &TestDataBuilder::daily_programs(prefix, first, 12),
            &FlattenContext {
                organization_id: org,
                default_tz: Tz::UTC,
                branding: &branding,
                facility_ids: &[],
                include_past: false,
                today,
            },
        ));
    }
    merge_events(batches)
}

#[test]
fn test_merged_ids_are_unique() {
    let events = sample_events(day(2024, 1, 15));
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for event in &events {
        *counts.entry(event.id.as_str()).or_default() += 1;
    }
    assert!(counts.values().all(|&c| c == 1));
    // 3 + 12 + 12, the second "b" organization duplicates the first
    assert_eq!(events.len(), 27);
}

#[test]
fn test_every_event_in_horizon_lands_in_exactly_one_matching_day() {
    let today = day(2024, 1, 15);
    let events = sample_events(today);
    let schedule = build_week_schedule(&events, 3, today);

    let first = schedule[0].days[0].date;
    let last = schedule[2].days[6].date;

    for event in &events {
        let placements: Vec<NaiveDate> = schedule
            .iter()
            .flat_map(|w| &w.days)
            .filter(|d| d.events.iter().any(|e| e.id == event.id))
            .map(|d| d.date)
            .collect();
        if event.date >= first && event.date <= last {
            assert_eq!(placements, vec![event.date], "event {}", event.id);
        } else {
            assert!(placements.is_empty(), "event {} outside horizon", event.id);
        }
    }
}

#[test]
fn test_local_date_drives_bucketing() {
    let today = day(2024, 1, 15);
    let events = sample_events(today);
    let late = events.iter().find(|e| e.id == "late").unwrap();
    assert_eq!(late.date, day(2024, 1, 17));

    let schedule = build_week_schedule(&events, 1, today);
    let wednesday = &schedule[0].days[3];
    assert_eq!(wednesday.date.weekday(), Weekday::Wed);
    assert!(wednesday.events.iter().any(|e| e.id == "late"));
}

#[test]
fn test_days_sorted_by_start_then_id() {
    let today = day(2024, 1, 15);
    let schedule = build_week_schedule(&sample_events(today), 4, today);

    for day_schedule in schedule.iter().flat_map(|w| &w.days) {
        for pair in day_schedule.events.windows(2) {
            let ordered = (pair[0].start, &pair[0].id) <= (pair[1].start, &pair[1].id);
            assert!(ordered, "unsorted on {}", day_schedule.date);
        }
    }

    let saturday = &schedule[0].days[6];
    let ids: Vec<_> = saturday
        .events
        .iter()
        .filter(|e| e.id.starts_with("same-time"))
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(ids, vec!["same-time-a", "same-time-b"]);
}

#[test]
fn test_weeks_start_on_sunday_and_are_contiguous() {
    let today = day(2024, 1, 15);
    let schedule = build_week_schedule(&sample_events(today), 6, today);
    assert_eq!(schedule.len(), 6);

    let mut expected = day(2024, 1, 14);
    for week in &schedule {
        assert_eq!(week.week_start.weekday(), Weekday::Sun);
        assert_eq!(week.days.len(), 7);
        for d in &week.days {
            assert_eq!(d.date, expected);
            expected = expected.succ_opt().unwrap();
        }
    }
}

#[test]
fn test_month_view_contains_all_month_events() {
    let today = day(2024, 1, 1);
    let events = sample_events(today);
    let schedule = build_month_schedule(&events, 2024, 1).unwrap();

    let in_month = events.iter().filter(|e| e.date.month() == 1).count();
    let placed = schedule
        .iter()
        .flat_map(|w| &w.days)
        .filter(|d| d.date.month() == 1)
        .map(|d| d.events.len())
        .sum::<usize>();
    assert_eq!(placed, in_month);
    assert_eq!(schedule[0].week_start, day(2023, 12, 31));
}
