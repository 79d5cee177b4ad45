//! Single-flight TTL cache for skyproxy.
//!
//! Serves a stored value while it is fresh and collapses concurrent misses
//! for the same key onto one upstream fetch.

mod cache;
mod config;
mod error;

pub use cache::{CacheStats, SingleFlightCache};
pub use config::CacheConfig;
pub use error::CacheError;
