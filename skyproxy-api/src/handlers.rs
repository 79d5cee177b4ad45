//! API route handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::debug;

use skyproxy_core::constants::WEATHER_CACHE_KEY;
use skyproxy_core::error::ProxyError;
use skyproxy_core::types::WeatherPayload;
use skyproxy_limiter::Decision;

use crate::client_id::ClientId;
use crate::dto::{HealthResponse, RateLimiterStatus};
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// GET /api/weather
///
/// Rate limit first, then serve from cache or fetch once for everyone
/// waiting. The payload is passed through untouched.
pub async fn get_weather(
    State(state): State<Arc<AppState>>,
    ClientId(client_id): ClientId,
) -> Result<Json<WeatherPayload>> {
    if let Decision::Rejected { retry_after } = state.limiter.consume(&client_id) {
        return Err(ProxyError::RateLimitExceeded {
            client_id,
            retry_after_secs: retry_after.as_secs_f64().ceil() as u64,
        }
        .into());
    }

    let fetcher = state.fetcher.clone();
    let payload = state
        .cache
        .get_or_fetch(WEATHER_CACHE_KEY, move || async move { fetcher.fetch().await })
        .await
        .map_err(ProxyError::from)?;

    debug!(ip = %client_id, "Weather data served successfully");
    Ok(Json(payload))
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.config.rate_limit;

    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.uptime_seconds(),
        started_at: state.started_at(),
        upstream: state.fetcher.describe(),
        cache: state.cache.stats(),
        rate_limiter: RateLimiterStatus {
            policy: state.limiter.policy(),
            tracked_clients: state.limiter.tracked_clients(),
            max_requests: config.max_requests,
            window_seconds: config.window_seconds,
        },
    })
}
