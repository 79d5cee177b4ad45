//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use skyproxy_core::constants::{DEFAULT_CACHE_TTL_SECS, MAX_CONFIG_DURATION_SECS};
use skyproxy_core::error::{ProxyError, Result};

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a stored value is served, in seconds
    pub ttl_seconds: u64,
    /// Upper bound on how long a caller waits for an in-flight fetch.
    /// `None` waits for as long as the fetch takes.
    pub wait_timeout_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            wait_timeout_seconds: None,
        }
    }
}

impl CacheConfig {
    /// Creates a config with the given TTL and no wait bound.
    pub fn with_ttl(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            ..Default::default()
        }
    }

    /// TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Wait bound as a [`Duration`].
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_seconds.map(Duration::from_secs)
    }

    /// Rejects settings that would make the cache useless or hang callers.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_seconds == 0 {
            return Err(ProxyError::ConfigError("cache TTL must be at least 1 second".into()));
        }
        if self.ttl_seconds > MAX_CONFIG_DURATION_SECS {
            return Err(ProxyError::ConfigError(format!(
                "cache TTL ({}s) exceeds the {}s maximum",
                self.ttl_seconds, MAX_CONFIG_DURATION_SECS
            )));
        }
        match self.wait_timeout_seconds {
            Some(0) => Err(ProxyError::ConfigError(
                "cache wait timeout must be at least 1 second".into(),
            )),
            Some(secs) if secs > MAX_CONFIG_DURATION_SECS => Err(ProxyError::ConfigError(format!(
                "cache wait timeout ({}s) exceeds the {}s maximum",
                secs, MAX_CONFIG_DURATION_SECS
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert_eq!(config.wait_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(CacheConfig::with_ttl(0).validate().is_err());

        let config = CacheConfig {
            ttl_seconds: 300,
            wait_timeout_seconds: Some(0),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(CacheConfig::with_ttl(u64::MAX).validate().is_err());
        assert!(CacheConfig::with_ttl(MAX_CONFIG_DURATION_SECS).validate().is_ok());

        let config = CacheConfig {
            ttl_seconds: 300,
            wait_timeout_seconds: Some(u64::MAX),
        };
        assert!(config.validate().is_err());
    }
}
