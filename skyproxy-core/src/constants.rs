//! Baseline constants for skyproxy.
//!
//! Every value here is only a default; the API configuration layer can
//! override all of them at startup.

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed forecast coordinates (Berlin).
pub const DEFAULT_LATITUDE: f64 = 52.52;

/// Fixed forecast coordinates (Berlin).
pub const DEFAULT_LONGITUDE: f64 = 13.41;

/// Open-Meteo forecast URL for the fixed coordinates.
/// Requests the current temperature plus one day of hourly temperatures.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.open-meteo.com/v1/forecast?latitude=52.52&longitude=13.41&current=temperature_2m&hourly=temperature_2m&forecast_days=1";

/// Per-request timeout for the upstream call, in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Longest upstream error body kept in a [`FetchError`](crate::FetchError) message.
pub const UPSTREAM_ERROR_BODY_LIMIT: usize = 200;

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache key for the forecast. The coordinates are fixed, so there is
/// exactly one logical resource.
pub const WEATHER_CACHE_KEY: &str = "weather_forecast_berlin";

/// How long a fetched forecast is served before refetching (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

// ═══════════════════════════════════════════════════════════════════════════════
// RATE LIMITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Accepted requests per client per window.
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 60;

/// Rate limit window length, in seconds.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Clients idle longer than this are dropped from limiter state (10 minutes).
pub const DEFAULT_LIMITER_IDLE_SECS: u64 = 600;

/// Bucket shared by every request whose origin cannot be determined.
pub const UNKNOWN_CLIENT_ID: &str = "unknown";

// ═══════════════════════════════════════════════════════════════════════════════
// HOUSEKEEPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Interval of the background sweeper that evicts idle clients and expired entries.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Longest accepted value for any configured duration (one year).
/// Keeps `Instant + Duration` arithmetic far from overflow.
pub const MAX_CONFIG_DURATION_SECS: u64 = 365 * 24 * 60 * 60;
