//! GCRA token bucket per client, backed by governor.

use std::num::NonZeroU32;

use governor::clock::{Clock as _, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota};
use tracing::debug;

use skyproxy_core::error::{ProxyError, Result};

use crate::config::{RateLimitConfig, RateLimitPolicy};
use crate::limiter::{Decision, RateLimiter};

/// Burst of `max_requests`, refilling one request every `window / max_requests`.
///
/// Unlike the fixed window, a client that drains its burst gets single
/// requests back gradually instead of the whole quota at once.
///
/// This bounds the long-run rate to `max_requests` per window, not each
/// window: a client may be accepted up to `2 * max_requests - 1` times
/// within one window length. Use [`FixedWindowLimiter`] where the hard
/// per-window cap matters.
///
/// [`FixedWindowLimiter`]: crate::FixedWindowLimiter
pub struct TokenBucketLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl TokenBucketLimiter {
    /// Creates a limiter from `config`.
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        config.validate()?;

        let burst = NonZeroU32::new(config.max_requests)
            .ok_or_else(|| ProxyError::ConfigError("rate limit burst must be non-zero".into()))?;
        let quota = Quota::with_period(config.window() / config.max_requests)
            .ok_or_else(|| ProxyError::ConfigError("rate limit refill period is zero".into()))?
            .allow_burst(burst);

        Ok(Self {
            limiter: governor::RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        })
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn consume(&self, client_id: &str) -> Decision {
        match self.limiter.check_key(&client_id.to_owned()) {
            Ok(()) => Decision::Accepted,
            Err(not_until) => Decision::Rejected {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        }
    }

    /// Drops clients whose bucket has refilled completely; their state is
    /// indistinguishable from a new client's.
    fn evict_idle(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        let evicted = before.saturating_sub(self.limiter.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.limiter.len(), "Evicted refilled token buckets");
        }
        evicted
    }

    fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::TokenBucket
    }
}

impl std::fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("tracked_clients", &self.limiter.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bucket(max_requests: u32, window_seconds: u64) -> TokenBucketLimiter {
        let config = RateLimitConfig::per_window(max_requests, window_seconds)
            .with_policy(RateLimitPolicy::TokenBucket);
        TokenBucketLimiter::new(&config).unwrap()
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = bucket(3, 60);

        for _ in 0..3 {
            assert!(limiter.consume("1.2.3.4").is_accepted());
        }
        let retry_after = limiter.consume("1.2.3.4").retry_after().unwrap();
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after <= Duration::from_secs(20));
    }

    #[test]
    fn test_refill_can_exceed_quota_within_one_window() {
        let limiter = bucket(2, 2);

        assert!(limiter.consume("a").is_accepted());
        assert!(limiter.consume("a").is_accepted());
        assert!(!limiter.consume("a").is_accepted());

        // One token returns after window / max_requests, well inside the
        // window that the first two requests opened.
        std::thread::sleep(Duration::from_millis(1100));
        assert!(limiter.consume("a").is_accepted());
    }

    #[test]
    fn test_clients_are_isolated() {
        let limiter = bucket(1, 60);

        assert!(limiter.consume("a").is_accepted());
        assert!(!limiter.consume("a").is_accepted());
        assert!(limiter.consume("b").is_accepted());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_drained_bucket_is_not_evicted() {
        let limiter = bucket(2, 3600);
        limiter.consume("a");
        limiter.consume("a");

        assert_eq!(limiter.evict_idle(), 0);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = RateLimitConfig::per_window(0, 60).with_policy(RateLimitPolicy::TokenBucket);
        assert!(TokenBucketLimiter::new(&config).is_err());
    }
}
