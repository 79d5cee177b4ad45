//! App state: cache, rate limiter, upstream fetcher, config.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::debug;

use skyproxy_cache::SingleFlightCache;
use skyproxy_core::clock::{SharedClock, SystemClock};
use skyproxy_core::error::{FetchError, Result};
use skyproxy_core::traits::WeatherFetcher;
use skyproxy_core::types::WeatherPayload;
use skyproxy_limiter::{build_limiter, RateLimiter};
use skyproxy_upstream::OpenMeteoClient;

use crate::config::ApiConfig;

/// Weather cache keyed by resource name.
pub type WeatherCache = SingleFlightCache<WeatherPayload, FetchError>;

/// Shared by every request handler. Built once at startup.
pub struct AppState {
    pub config: ApiConfig,
    pub cache: WeatherCache,
    pub limiter: Arc<dyn RateLimiter>,
    pub fetcher: Arc<dyn WeatherFetcher>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Builds the production state: Open-Meteo upstream, system clock.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let fetcher = Arc::new(OpenMeteoClient::with_config(config.upstream.clone())?);
        Self::with_parts(config, fetcher, SystemClock::shared())
    }

    /// Builds state around an arbitrary fetcher and clock.
    pub fn with_parts(
        config: ApiConfig,
        fetcher: Arc<dyn WeatherFetcher>,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;

        let cache = SingleFlightCache::with_clock(config.cache.clone(), clock.clone());
        let limiter = build_limiter(&config.rate_limit, clock)?;

        Ok(Self {
            config,
            cache,
            limiter,
            fetcher,
            started: Instant::now(),
            started_at: Utc::now(),
        })
    }

    /// Seconds since the state was built.
    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// When the state was built.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Drops idle limiter state and expired cache entries.
    ///
    /// Returns `(evicted_clients, purged_entries)`.
    pub fn sweep(&self) -> (usize, usize) {
        let evicted = self.limiter.evict_idle();
        let purged = self.cache.purge_expired();
        debug!(
            evicted_clients = evicted,
            purged_entries = purged,
            tracked_clients = self.limiter.tracked_clients(),
            "Sweep complete"
        );
        (evicted, purged)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("upstream", &self.fetcher.describe())
            .field("limiter", &self.limiter)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}
