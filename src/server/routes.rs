use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::query::{EventsQuery, ScheduleQuery};
use crate::constants::{cache_control, headers};
use crate::discovery::{DiscoveryService, Mode, WarmingScheduler};
use crate::error::AppError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DiscoveryService>,
    pub warming: Arc<WarmingScheduler>,
    pub cron_secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(get_events))
        .route("/schedule", get(get_schedule))
        .route("/cron/warm-discovery", get(warm_discovery))
        .route("/cache/discovery", delete(clear_cache))
        .route("/cache/discovery/{slug}", delete(invalidate_tenant))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Checks the `Authorization: Bearer` secret. Without a configured secret
/// every request is rejected.
fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), AppError> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        warn!("Rejecting protected request: no cron secret configured");
        return Err(AppError::Unauthorized);
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if secrets_match(token, secret) => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Compares fixed-size digests without short-circuiting, so the time taken
/// depends on neither the length nor the content of the provided token
fn secrets_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn no_store<T: IntoResponse>(body: T) -> Response {
    (
        [(header::CACHE_CONTROL, cache_control::NO_STORE)],
        body,
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> Response {
    no_store(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "stats": state.service.stats().snapshot(),
    })))
}

async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, AppError> {
    let request = query.into_request()?;
    let result = state.service.get_discovery_events(&request).await?;

    let cache_control = match request.mode {
        Mode::Availability => cache_control::AVAILABILITY,
        Mode::Full => cache_control::FULL,
    };

    let mut response = Json(result.payload).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    response_headers.insert(
        HeaderName::from_static(headers::CACHE_STATUS),
        HeaderValue::from_static(result.cache_status.as_str()),
    );
    response_headers.insert(
        HeaderName::from_static(headers::MODE),
        HeaderValue::from_static(request.mode.as_str()),
    );
    if let Ok(value) = HeaderValue::from_str(&result.cache_key) {
        response_headers.insert(HeaderName::from_static(headers::CACHE_KEY), value);
    }
    Ok(response)
}

async fn get_schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Response, AppError> {
    let (slug, weeks) = query.parse()?;
    let schedule = state
        .service
        .fetch_schedule_uncached(&slug, weeks, Utc::now())
        .await?;
    Ok(no_store(Json(json!({
        "slug": slug,
        "weeks": weeks,
        "schedule": schedule,
    }))))
}

async fn warm_discovery(
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    authorize(&request_headers, state.cron_secret.as_deref())?;
    let summary = state.warming.run().await?;
    Ok(no_store(Json(summary)))
}

async fn invalidate_tenant(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    authorize(&request_headers, state.cron_secret.as_deref())?;
    let removed = state.service.invalidate_tenant(&slug).await;
    Ok(no_store(Json(json!({ "slug": slug, "removed": removed }))))
}

async fn clear_cache(
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    authorize(&request_headers, state.cron_secret.as_deref())?;
    state.service.clear_all().await;
    info!("Discovery cache cleared on request");
    Ok(no_store(Json(json!({ "cleared": true }))))
}
