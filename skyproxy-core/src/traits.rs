//! Common traits for skyproxy.
//!
//! The upstream client sits behind [`WeatherFetcher`] so the API and the
//! cache can be exercised against stub fetchers.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::WeatherPayload;

// ═══════════════════════════════════════════════════════════════════════════════
// FETCHER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of forecast payloads.
///
/// Implementations perform exactly one upstream call per invocation and
/// never retry; retry is left to the next client request.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// Fetches the current forecast.
    async fn fetch(&self) -> std::result::Result<WeatherPayload, FetchError>;

    /// Human-readable description of the upstream, for logs and `/health`.
    fn describe(&self) -> String;
}
