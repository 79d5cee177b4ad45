//! Response bodies that are not the upstream payload itself.

use chrono::{DateTime, Utc};
use serde::Serialize;

use skyproxy_cache::CacheStats;
use skyproxy_limiter::RateLimitPolicy;

/// GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub upstream: String,
    pub cache: CacheStats,
    pub rate_limiter: RateLimiterStatus,
}

/// Rate limiter section of [`HealthResponse`].
#[derive(Debug, Serialize)]
pub struct RateLimiterStatus {
    pub policy: RateLimitPolicy,
    pub tracked_clients: usize,
    pub max_requests: u32,
    pub window_seconds: u64,
}
