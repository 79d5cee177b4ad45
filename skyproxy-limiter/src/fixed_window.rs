//! Fixed-window counter per client.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use skyproxy_core::clock::{SharedClock, SystemClock};
use skyproxy_core::error::Result;

use crate::config::{RateLimitConfig, RateLimitPolicy};
use crate::limiter::{Decision, RateLimiter};

/// Accounting for one client.
#[derive(Clone, Copy, Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
    last_seen: Instant,
}

/// Allows at most `max_requests` per client in each window.
///
/// A client's window opens on its first request and lasts `window`; the
/// first request at or after `window_start + window` opens a new one.
///
/// # Thread Safety
///
/// Each client's state is updated under its DashMap shard lock, so the
/// check and the increment are a single atomic step.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    clients: DashMap<String, WindowState>,
    max_requests: u32,
    window: Duration,
    idle_after: Option<Duration>,
    clock: SharedClock,
}

impl FixedWindowLimiter {
    /// Creates a limiter on the system clock.
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Creates a limiter that reads time from `clock`.
    pub fn with_clock(config: &RateLimitConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            clients: DashMap::new(),
            max_requests: config.max_requests,
            window: config.window(),
            idle_after: config.idle_eviction(),
            clock,
        })
    }

    /// `None` when the window reaches past what `Instant` can represent,
    /// in which case it never closes.
    fn window_end(&self, window_start: Instant) -> Option<Instant> {
        window_start.checked_add(self.window)
    }

    fn apply(&self, state: &mut WindowState, now: Instant) -> Decision {
        if self.window_end(state.window_start).is_some_and(|end| now >= end) {
            state.window_start = now;
            state.count = 0;
        }
        state.last_seen = now;

        if state.count < self.max_requests {
            state.count += 1;
            Decision::Accepted
        } else {
            let retry_after = self
                .window_end(state.window_start)
                .map_or(self.window, |end| end.saturating_duration_since(now));
            Decision::Rejected { retry_after }
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn consume(&self, client_id: &str) -> Decision {
        let now = self.clock.now();

        if let Some(mut state) = self.clients.get_mut(client_id) {
            return self.apply(&mut state, now);
        }

        let mut state = self
            .clients
            .entry(client_id.to_owned())
            .or_insert_with(|| WindowState {
                window_start: now,
                count: 0,
                last_seen: now,
            });
        self.apply(&mut state, now)
    }

    fn evict_idle(&self) -> usize {
        let Some(idle_after) = self.idle_after else {
            return 0;
        };
        let now = self.clock.now();
        let before = self.clients.len();
        self.clients
            .retain(|_, state| now.saturating_duration_since(state.last_seen) < idle_after);
        let evicted = before.saturating_sub(self.clients.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.clients.len(), "Evicted idle rate limit state");
        }
        evicted
    }

    fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::FixedWindow
    }
}
