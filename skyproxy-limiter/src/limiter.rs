//! Limiter trait and construction.

use std::sync::Arc;
use std::time::Duration;

use skyproxy_core::clock::SharedClock;
use skyproxy_core::error::Result;

use crate::config::{RateLimitConfig, RateLimitPolicy};
use crate::fixed_window::FixedWindowLimiter;
use crate::token_bucket::TokenBucketLimiter;

/// Outcome of a single [`RateLimiter::consume`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The request counts against the quota and may proceed.
    Accepted,
    /// The quota is used up; nothing was counted.
    Rejected {
        /// Earliest time after which a request can be accepted again.
        retry_after: Duration,
    },
}

impl Decision {
    /// Returns true if the request may proceed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }

    /// Wait hint for rejected requests.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Accepted => None,
            Decision::Rejected { retry_after } => Some(*retry_after),
        }
    }
}

/// Per-client quota enforcement.
///
/// `consume` must be atomic per client: concurrent calls for one client
/// never accept more than the quota between them.
pub trait RateLimiter: Send + Sync + std::fmt::Debug {
    /// Counts one request from `client_id` if the quota allows it.
    fn consume(&self, client_id: &str) -> Decision;

    /// Forgets clients that have gone quiet. Returns how many were dropped.
    fn evict_idle(&self) -> usize;

    /// Number of clients with live state.
    fn tracked_clients(&self) -> usize;

    /// Accounting strategy in use.
    fn policy(&self) -> RateLimitPolicy;
}

/// Builds the limiter selected by `config.policy`.
///
/// `clock` drives the fixed-window policy; the token bucket uses governor's
/// own monotonic clock.
pub fn build_limiter(config: &RateLimitConfig, clock: SharedClock) -> Result<Arc<dyn RateLimiter>> {
    config.validate()?;

    let limiter: Arc<dyn RateLimiter> = match config.policy {
        RateLimitPolicy::FixedWindow => Arc::new(FixedWindowLimiter::with_clock(config, clock)?),
        RateLimitPolicy::TokenBucket => Arc::new(TokenBucketLimiter::new(config)?),
    };
    Ok(limiter)
}
