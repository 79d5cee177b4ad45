//! # skyproxy limiter
//!
//! Per-client request quotas, consulted once per request before any cache
//! or upstream work happens.
//!
//! Two policies are available behind the [`RateLimiter`] trait:
//!
//! - [`FixedWindowLimiter`]: at most `N` accepted requests per client in each
//!   window of length `W`, the window opening on the client's first request.
//! - [`TokenBucketLimiter`]: GCRA with a burst of `N`, refilling one request
//!   every `W / N`. This caps the long-run rate, not each window: up to
//!   `2N - 1` requests can land inside one window length.
//!
//! ## Example
//!
//! ```rust
//! use skyproxy_core::SystemClock;
//! use skyproxy_limiter::{build_limiter, RateLimitConfig};
//!
//! let limiter = build_limiter(&RateLimitConfig::default(), SystemClock::shared()).unwrap();
//! assert!(limiter.consume("203.0.113.7").is_accepted());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod fixed_window;
mod limiter;
mod token_bucket;

pub use config::{RateLimitConfig, RateLimitPolicy};
pub use fixed_window::FixedWindowLimiter;
pub use limiter::{build_limiter, Decision, RateLimiter};
pub use token_bucket::TokenBucketLimiter;
