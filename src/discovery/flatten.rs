//! Flattening of upstream program trees into calendar events, and the merge
//! of per-organization batches into one deterministic list.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, trace};

use super::models::CalendarEvent;
use crate::config::Branding;
use crate::upstream::{Program, Session, UpstreamEvent};

/// Per-organization inputs of one flattening pass
#[derive(Debug, Clone)]
pub struct FlattenContext<'a> {
    pub organization_id: &'a str,
    /// Zone used when the facility carries none
    pub default_tz: Tz,
    pub branding: &'a Branding,
    /// Empty means every facility
    pub facility_ids: &'a [String],
    pub include_past: bool,
    pub today: NaiveDate,
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parses an upstream timestamp. Values without an offset are local to `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

/// Builds the registration link for a session.
///
/// Closed registration has no link. Open registration sends the visitor
/// straight to purchasable products.
pub fn registration_link(
    template: Option<&str>,
    organization_id: &str,
    program_id: &str,
    session_id: &str,
    registration_open: Option<bool>,
) -> Option<String> {
    let template = template?;
    if registration_open == Some(false) {
        return None;
    }

    let link = template
        .replace("{org_id}", organization_id)
        .replace("{program_id}", program_id)
        .replace("{session_id}", session_id);

    if registration_open == Some(true) {
        let separator = if link.contains('?') { '&' } else { '?' };
        Some(format!("{link}{separator}skipToProducts=true"))
    } else {
        Some(link)
    }
}

fn session_tz(session: &Session, default_tz: Tz) -> Tz {
    session
        .facility
        .as_ref()
        .and_then(|facility| facility.timezone.as_deref())
        .and_then(|name| Tz::from_str(name).ok())
        .unwrap_or(default_tz)
}

fn flatten_occurrence(
    program: &Program,
    session: &Session,
    occurrence: &UpstreamEvent,
    tz: Tz,
    ctx: &FlattenContext<'_>,
) -> Option<CalendarEvent> {
    let start = occurrence
        .start
        .as_deref()
        .and_then(|raw| parse_timestamp(raw, tz));
    let Some(start) = start else {
        trace!(
            "Skipping occurrence {} of session {}: missing or invalid start",
            occurrence.id, session.id
        );
        return None;
    };
    let end = occurrence
        .end
        .as_deref()
        .and_then(|raw| parse_timestamp(raw, tz))
        .filter(|end| *end >= start)
        .unwrap_or(start);

    if !ctx.include_past && end.with_timezone(&tz).date_naive() < ctx.today {
        return None;
    }

    let session_facility = session.facility.as_ref();
    let facility_id = occurrence
        .facility_id
        .clone()
        .or_else(|| session_facility.map(|facility| facility.id.clone()));
    if let Some(id) = &facility_id
        && !ctx.facility_ids.is_empty()
        && !ctx.facility_ids.contains(id)
    {
        return None;
    }
    let facility_name = session_facility
        .filter(|facility| facility_id.as_deref() == Some(facility.id.as_str()))
        .and_then(|facility| facility.name.clone());

    let title = occurrence
        .name
        .clone()
        .or_else(|| session.name.clone())
        .or_else(|| program.name.clone())
        .unwrap_or_default();

    let registration_open = session.registration_open.or(program.registration_open);

    Some(CalendarEvent {
        id: occurrence.id.clone(),
        title,
        program_id: program.id.clone(),
        program_name: program.name.clone(),
        session_id: session.id.clone(),
        session_name: session.name.clone(),
        facility_id,
        facility_name,
        organization_id: ctx.organization_id.to_string(),
        start,
        end,
        date: start.with_timezone(&tz).date_naive(),
        color: ctx.branding.color.clone(),
        spots_remaining: occurrence.spots_remaining,
        capacity: occurrence.capacity,
        price: occurrence.price.or(session.price),
        registration_url: registration_link(
            ctx.branding.registration_url_template.as_deref(),
            ctx.organization_id,
            &program.id,
            &session.id,
            registration_open,
        ),
    })
}

/// Flattens one organization's programs. Sessions without occurrences and
/// occurrences without a usable start contribute nothing.
pub fn flatten_programs(programs: &[Program], ctx: &FlattenContext<'_>) -> Vec<CalendarEvent> {
    let mut events = Vec::new();
    for program in programs {
        for session in &program.sessions {
            let tz = session_tz(session, ctx.default_tz);
            events.extend(
                session
                    .events
                    .iter()
                    .chain(session.segments.iter())
                    .filter_map(|occurrence| flatten_occurrence(program, session, occurrence, tz, ctx)),
            );
        }
    }
    debug!(
        "Organization {}: flattened {} programs into {} events",
        ctx.organization_id,
        programs.len(),
        events.len()
    );
    events
}

/// Merges batches in the given order, keeping the first event seen for each
/// id, then sorts by start time with ties broken by id.
pub fn merge_events(batches: Vec<Vec<CalendarEvent>>) -> Vec<CalendarEvent> {
    let mut seen = HashSet::new();
    let mut merged: Vec<CalendarEvent> = batches
        .into_iter()
        .flatten()
        .filter(|event| seen.insert(event.id.clone()))
        .collect();
    sort_events(&mut merged);
    merged
}

pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
}
