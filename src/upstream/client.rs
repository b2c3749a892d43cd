use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use super::fetch_utils::fetch;
use super::http_client::create_http_client_with_timeout;
use super::models::{Program, ProgramsResponse};
use super::urls::build_programs_url;
use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECONDS, PROGRAM_EXPAND};
use crate::error::AppError;

/// Parameters of one programs request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramQuery {
    pub api_key: String,
    pub facility_ids: Vec<String>,
    pub expand: String,
}

impl ProgramQuery {
    pub fn new(api_key: impl Into<String>, facility_ids: Vec<String>) -> Self {
        Self {
            api_key: api_key.into(),
            facility_ids,
            expand: PROGRAM_EXPAND.to_string(),
        }
    }
}

/// Source of program trees for an organization
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetch every program of `org_id`, with sessions and occurrences embedded
    async fn get_programs(
        &self,
        org_id: &str,
        query: &ProgramQuery,
    ) -> Result<Vec<Program>, AppError>;
}

/// reqwest-backed client for the sports-management API
pub struct HttpUpstreamClient {
    client: Client,
    api_domain: String,
    call_timeout: Duration,
}

impl HttpUpstreamClient {
    pub fn new(client: Client, api_domain: impl Into<String>) -> Self {
        Self {
            client,
            api_domain: api_domain.into(),
            call_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
        }
    }

    /// Builds a client with its own connection pool. `timeout_seconds` bounds
    /// each organization fetch as a whole, retries included.
    pub fn with_timeout(api_domain: impl Into<String>, timeout_seconds: u64) -> Result<Self, AppError> {
        let client = create_http_client_with_timeout(timeout_seconds)?;
        Ok(Self::new(client, api_domain).with_call_timeout(Duration::from_secs(timeout_seconds)))
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    #[instrument(skip(self, query), fields(org_id = %org_id))]
    async fn get_programs(
        &self,
        org_id: &str,
        query: &ProgramQuery,
    ) -> Result<Vec<Program>, AppError> {
        let url = build_programs_url(&self.api_domain, org_id, &query.expand, &query.facility_ids);
        let response: ProgramsResponse =
            fetch(&self.client, &url, &query.api_key, self.call_timeout).await?;
        let programs = response.into_programs(org_id);
        debug!("Organization {} returned {} programs", org_id, programs.len());
        Ok(programs)
    }
}
