//! Rate limiter configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use skyproxy_core::constants::{
    DEFAULT_LIMITER_IDLE_SECS, DEFAULT_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_WINDOW_SECS,
    MAX_CONFIG_DURATION_SECS,
};
use skyproxy_core::error::{ProxyError, Result};

/// Accounting strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Counter reset at the end of each window.
    #[default]
    FixedWindow,
    /// GCRA token bucket. Smooths the rate but may accept more than the
    /// quota within a single window.
    TokenBucket,
}

impl RateLimitPolicy {
    /// Name used in config and `/health`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitPolicy::FixedWindow => "fixed_window",
            RateLimitPolicy::TokenBucket => "token_bucket",
        }
    }
}

impl fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateLimitPolicy {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fixed_window" => Ok(RateLimitPolicy::FixedWindow),
            "token_bucket" => Ok(RateLimitPolicy::TokenBucket),
            other => Err(ProxyError::ConfigError(format!(
                "unknown rate limit policy '{}', expected fixed_window or token_bucket",
                other
            ))),
        }
    }
}

/// Rate limiter configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Accepted requests per client per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_seconds: u64,
    /// Accounting strategy
    pub policy: RateLimitPolicy,
    /// Drop fixed-window state for clients idle this long.
    /// `None` keeps every client for the process lifetime.
    pub idle_eviction_seconds: Option<u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX,
            window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            policy: RateLimitPolicy::FixedWindow,
            idle_eviction_seconds: Some(DEFAULT_LIMITER_IDLE_SECS),
        }
    }
}

impl RateLimitConfig {
    /// Creates a fixed-window config allowing `max_requests` per `window_seconds`.
    pub fn per_window(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
            ..Default::default()
        }
    }

    /// Switches the accounting strategy.
    pub fn with_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Idle eviction threshold as a [`Duration`].
    pub fn idle_eviction(&self) -> Option<Duration> {
        self.idle_eviction_seconds.map(Duration::from_secs)
    }

    /// Validates the quota.
    ///
    /// Idle eviction shorter than the window is rejected: evicting a client
    /// mid-window would hand it a fresh quota.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(ProxyError::ConfigError(
                "rate limit must allow at least 1 request per window".into(),
            ));
        }
        if self.window_seconds == 0 {
            return Err(ProxyError::ConfigError(
                "rate limit window must be at least 1 second".into(),
            ));
        }
        if self.window_seconds > MAX_CONFIG_DURATION_SECS {
            return Err(ProxyError::ConfigError(format!(
                "rate limit window ({}s) exceeds the {}s maximum",
                self.window_seconds, MAX_CONFIG_DURATION_SECS
            )));
        }
        if let Some(idle) = self.idle_eviction_seconds {
            if idle > MAX_CONFIG_DURATION_SECS {
                return Err(ProxyError::ConfigError(format!(
                    "idle eviction ({}s) exceeds the {}s maximum",
                    idle, MAX_CONFIG_DURATION_SECS
                )));
            }
            if idle < self.window_seconds {
                return Err(ProxyError::ConfigError(format!(
                    "idle eviction ({}s) must not be shorter than the rate limit window ({}s)",
                    idle, self.window_seconds
                )));
            }
        }
        Ok(())
    }
}
