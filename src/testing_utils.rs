use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::TenantConfig;
use crate::error::AppError;
use crate::upstream::{FacilityRef, Program, ProgramQuery, Session, UpstreamClient, UpstreamEvent};

/// Test utilities for creating mock data and testing scenarios
pub struct TestDataBuilder;

impl TestDataBuilder {
    /// Starts a program tree
    pub fn program(id: &str, name: &str) -> ProgramBuilder {
        ProgramBuilder {
            program: Program {
                id: id.to_string(),
                name: Some(name.to_string()),
                registration_open: None,
                sessions: Vec::new(),
            },
        }
    }

    /// Starts a session
    pub fn session(id: &str, name: &str) -> SessionBuilder {
        SessionBuilder {
            session: Session {
                id: id.to_string(),
                name: Some(name.to_string()),
                registration_open: None,
                facility: None,
                price: None,
                events: Vec::new(),
                segments: Vec::new(),
            },
        }
    }

    /// Creates an occurrence with spots and capacity set
    pub fn upstream_event(id: &str, start: &str, end: &str) -> UpstreamEvent {
        UpstreamEvent {
            id: id.to_string(),
            name: None,
            start: Some(start.to_string()),
            end: Some(end.to_string()),
            facility_id: None,
            spots_remaining: Some(5),
            capacity: Some(10),
            price: None,
        }
    }

    /// One program with one session holding `count` daily events starting at
    /// `first_day` (YYYY-MM-DD) 18:00 UTC. Event ids are `{prefix}-{n}`.
    pub fn daily_programs(prefix: &str, first_day: &str, count: usize) -> Vec<Program> {
        let mut session = Self::session(&format!("{prefix}-session"), &format!("{prefix} session"));
        let first = chrono::NaiveDate::parse_from_str(first_day, "%Y-%m-%d").unwrap_or_default();
        for n in 0..count {
            let day = first + chrono::Duration::days(n as i64);
            session = session.event(
                &format!("{prefix}-{n}"),
                &format!("{day}T18:00:00Z"),
                &format!("{day}T19:00:00Z"),
            );
        }
        vec![Self::program(&format!("{prefix}-program"), prefix).session(session).build()]
    }

    /// Creates an active tenant
    pub fn tenant(slug: &str, organization_ids: &[&str]) -> TenantConfig {
        let mut tenant = TenantConfig::new(
            slug,
            organization_ids.iter().map(|id| id.to_string()).collect(),
        );
        tenant.api_key = Some(format!("{slug}-key"));
        tenant
    }
}

pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn registration_open(mut self, open: bool) -> Self {
        self.program.registration_open = Some(open);
        self
    }

    pub fn session(mut self, session: SessionBuilder) -> Self {
        self.program.sessions.push(session.session);
        self
    }

    pub fn build(self) -> Program {
        self.program
    }
}

pub struct SessionBuilder {
    session: Session,
}

impl SessionBuilder {
    pub fn facility(mut self, id: &str, name: &str, timezone: Option<&str>) -> Self {
        self.session.facility = Some(FacilityRef {
            id: id.to_string(),
            name: Some(name.to_string()),
            timezone: timezone.map(str::to_string),
        });
        self
    }

    pub fn registration_open(mut self, open: bool) -> Self {
        self.session.registration_open = Some(open);
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.session.price = Some(price);
        self
    }

    pub fn event(mut self, id: &str, start: &str, end: &str) -> Self {
        self.session
            .events
            .push(TestDataBuilder::upstream_event(id, start, end));
        self
    }

    pub fn segment(mut self, id: &str, start: &str, end: &str) -> Self {
        self.session
            .segments
            .push(TestDataBuilder::upstream_event(id, start, end));
        self
    }

    /// Adds an occurrence with arbitrary (possibly missing) timestamps
    pub fn raw_event(mut self, id: &str, start: Option<&str>, end: Option<&str>) -> Self {
        self.session.events.push(UpstreamEvent {
            id: id.to_string(),
            name: None,
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            facility_id: None,
            spots_remaining: None,
            capacity: None,
            price: None,
        });
        self
    }
}

enum MockResponse {
    Programs(Vec<Program>),
    Failure,
}

/// In-memory upstream with per-organization responses, failures and an
/// optional artificial latency
#[derive(Default)]
pub struct MockUpstreamClient {
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    queries: Mutex<Vec<(String, ProgramQuery)>>,
    delay: Option<Duration>,
}

impl MockUpstreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_programs(&self, organization_id: &str, programs: Vec<Program>) {
        self.lock_responses()
            .insert(organization_id.to_string(), MockResponse::Programs(programs));
    }

    /// Makes every call for `organization_id` fail with a timeout
    pub fn set_failure(&self, organization_id: &str) {
        self.lock_responses()
            .insert(organization_id.to_string(), MockResponse::Failure);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were awaiting a response at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Organization ids and queries received so far
    pub fn queries(&self) -> Vec<(String, ProgramQuery)> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, HashMap<String, MockResponse>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn get_programs(
        &self,
        org_id: &str,
        query: &ProgramQuery,
    ) -> Result<Vec<Program>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((org_id.to_string(), query.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.lock_responses().get(org_id) {
            Some(MockResponse::Programs(programs)) => Ok(programs.clone()),
            Some(MockResponse::Failure) => Err(AppError::network_timeout(format!(
                "mock://organizations/{org_id}/programs"
            ))),
            None => Ok(Vec::new()),
        }
    }
}
