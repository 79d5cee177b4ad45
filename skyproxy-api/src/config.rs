//! Server configuration, assembled from defaults and `SKYPROXY_*` variables.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use skyproxy_cache::CacheConfig;
use skyproxy_core::constants::{DEFAULT_SWEEP_INTERVAL_SECS, MAX_CONFIG_DURATION_SECS};
use skyproxy_core::error::{ProxyError, Result};
use skyproxy_limiter::{RateLimitConfig, RateLimitPolicy};
use skyproxy_upstream::UpstreamConfig;

/// Environment variable names.
#[allow(missing_docs)]
pub mod vars {
    pub const UPSTREAM_URL: &str = "SKYPROXY_UPSTREAM_URL";
    pub const UPSTREAM_TIMEOUT_SECS: &str = "SKYPROXY_UPSTREAM_TIMEOUT_SECS";
    pub const CACHE_TTL_SECS: &str = "SKYPROXY_CACHE_TTL_SECS";
    pub const CACHE_WAIT_TIMEOUT_SECS: &str = "SKYPROXY_CACHE_WAIT_TIMEOUT_SECS";
    pub const RATE_LIMIT_MAX: &str = "SKYPROXY_RATE_LIMIT_MAX";
    pub const RATE_LIMIT_WINDOW_SECS: &str = "SKYPROXY_RATE_LIMIT_WINDOW_SECS";
    pub const RATE_LIMIT_POLICY: &str = "SKYPROXY_RATE_LIMIT_POLICY";
    pub const RATE_LIMIT_IDLE_SECS: &str = "SKYPROXY_RATE_LIMIT_IDLE_SECS";
    pub const TRUST_FORWARDED_FOR: &str = "SKYPROXY_TRUST_FORWARDED_FOR";
    pub const SWEEP_INTERVAL_SECS: &str = "SKYPROXY_SWEEP_INTERVAL_SECS";
}

/// Everything the server needs to start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    /// Take the client address from `X-Forwarded-For` when present.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Period of the background eviction sweep
    pub sweep_interval_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            trust_forwarded_for: false,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ApiConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from defaults overridden by whatever `lookup` returns.
    ///
    /// A variable that is set but does not parse is an error naming that
    /// variable; it never falls back to the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(vars::UPSTREAM_URL) {
            config.upstream.url = url;
        }
        if let Some(secs) = parse_var(&lookup, vars::UPSTREAM_TIMEOUT_SECS)? {
            config.upstream.timeout_seconds = secs;
        }
        if let Some(secs) = parse_var(&lookup, vars::CACHE_TTL_SECS)? {
            config.cache.ttl_seconds = secs;
        }
        if let Some(secs) = parse_var(&lookup, vars::CACHE_WAIT_TIMEOUT_SECS)? {
            config.cache.wait_timeout_seconds = Some(secs);
        }
        if let Some(max) = parse_var(&lookup, vars::RATE_LIMIT_MAX)? {
            config.rate_limit.max_requests = max;
        }
        if let Some(secs) = parse_var(&lookup, vars::RATE_LIMIT_WINDOW_SECS)? {
            config.rate_limit.window_seconds = secs;
        }
        if let Some(policy) = parse_var::<RateLimitPolicy, _>(&lookup, vars::RATE_LIMIT_POLICY)? {
            config.rate_limit.policy = policy;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, vars::RATE_LIMIT_IDLE_SECS)? {
            // 0 turns idle eviction off.
            config.rate_limit.idle_eviction_seconds = (secs > 0).then_some(secs);
        }
        if let Some(raw) = lookup(vars::TRUST_FORWARDED_FOR) {
            config.trust_forwarded_for = parse_bool(vars::TRUST_FORWARDED_FOR, &raw)?;
        }
        if let Some(secs) = parse_var(&lookup, vars::SWEEP_INTERVAL_SECS)? {
            config.sweep_interval_seconds = secs;
        }

        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.upstream.validate()?;
        self.cache.validate()?;
        self.rate_limit.validate()?;
        if self.sweep_interval_seconds == 0 {
            return Err(ProxyError::ConfigError(
                "sweep interval must be at least 1 second".into(),
            ));
        }
        if self.sweep_interval_seconds > MAX_CONFIG_DURATION_SECS {
            return Err(ProxyError::ConfigError(format!(
                "sweep interval ({}s) exceeds the {}s maximum",
                self.sweep_interval_seconds, MAX_CONFIG_DURATION_SECS
            )));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ProxyError::ConfigError(format!("{name}='{raw}': {e}"))),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ProxyError::ConfigError(format!(
            "{name}='{raw}': expected true or false"
        ))),
    }
}
