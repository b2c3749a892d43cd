//! Generic HTTP fetching with retry logic and error classification

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::constants::retry;
use crate::error::AppError;

/// Header carrying the tenant's upstream API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Fetches and decodes JSON from the upstream API.
///
/// This function:
/// - Sends the API key as a header so it never appears in logged URLs
/// - Retries retryable failures (429, 5xx, timeouts, connection errors) with exponential backoff
/// - Respects Retry-After headers for rate limiting
/// - Maps HTTP status codes onto specific `AppError` variants
///
/// `budget` bounds the whole call, retries and waits included. A wait that
/// would outlast the budget ends the call with the last error instead.
#[instrument(skip(client, api_key))]
pub(crate) async fn fetch<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    api_key: &str,
    budget: Duration,
) -> Result<T, AppError> {
    let deadline = Instant::now() + budget;
    match tokio::time::timeout(budget, fetch_with_retries(client, url, api_key, deadline)).await {
        Ok(result) => result,
        Err(_) => {
            error!("Fetching {} took longer than {:?}", url, budget);
            Err(AppError::network_timeout(url))
        }
    }
}

async fn fetch_with_retries<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    api_key: &str,
    deadline: Instant,
) -> Result<T, AppError> {
    let mut attempt = 0u32;
    let mut backoff = Duration::from_millis(retry::BASE_DELAY_MS);
    loop {
        let (error, retry_after) = match fetch_once(client, url, api_key).await {
            Ok(parsed) => return Ok(parsed),
            Err(failure) => failure,
        };

        let wait = retry_after.unwrap_or(backoff);
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !error.is_retryable() || attempt >= retry::MAX_RETRIES || wait >= remaining {
            error!("Request failed for URL {}: {}", url, error);
            return Err(error);
        }

        warn!(
            "{}. Retrying in {:?} (attempt {}/{})",
            error,
            wait,
            attempt + 1,
            retry::MAX_RETRIES
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
        backoff = backoff.saturating_mul(2);
    }
}

/// One request. Failures carry the server's Retry-After hint when it sent one.
async fn fetch_once<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    api_key: &str,
) -> Result<T, (AppError, Option<Duration>)> {
    debug!("Fetching data from URL: {url}");

    let response = client
        .get(url)
        .header(API_KEY_HEADER, api_key)
        .send()
        .await
        .map_err(|e| {
            let error = if e.is_timeout() {
                AppError::network_timeout(url)
            } else if e.is_connect() {
                AppError::network_connection(url, e.to_string())
            } else {
                AppError::ApiFetch(e)
            };
            (error, None)
        })?;

    let status = response.status();
    debug!("Response status: {status}");

    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        let status_code = status.as_u16();
        let reason = status.canonical_reason().unwrap_or("Unknown error");

        warn!("HTTP {} - {} (URL: {})", status_code, reason, url);

        let error = match status_code {
            404 => AppError::api_not_found(url),
            429 => AppError::api_rate_limit(reason, url),
            400..=499 => AppError::api_client_error(status_code, reason, url),
            502 | 503 => AppError::api_service_unavailable(status_code, reason, url),
            _ => AppError::api_server_error(status_code, reason, url),
        };
        return Err((error, retry_after));
    }

    let response_text = response
        .text()
        .await
        .map_err(|e| (AppError::ApiFetch(e), None))?;

    debug!("Response length: {} bytes", response_text.len());

    serde_json::from_str::<T>(&response_text).map_err(|e| {
        error!("Failed to parse API response: {} (URL: {})", e, url);
        let trimmed = response_text.trim_start();
        let error = if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
            AppError::api_malformed_json("Response is not valid JSON", url)
        } else {
            AppError::api_unexpected_structure(e.to_string(), url)
        };
        (error, None)
    })
}
