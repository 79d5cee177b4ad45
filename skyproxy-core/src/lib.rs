//! # skyproxy core
//!
//! Shared building blocks for the skyproxy weather proxy.
//!
//! - **Types**: the pass-through [`WeatherPayload`]
//! - **Errors**: [`ProxyError`] and the cloneable [`FetchError`]
//! - **Traits**: [`WeatherFetcher`], the seam between the cache and the upstream client
//! - **Clock**: [`Clock`] so TTL and window arithmetic can be driven by tests
//! - **Constants**: baseline TTL, quota and upstream URL
//!
//! ## Example
//!
//! ```rust
//! use skyproxy_core::WeatherPayload;
//!
//! let payload: WeatherPayload = serde_json::from_str(r#"{"latitude": 52.52}"#).unwrap();
//! assert_eq!(payload.latitude(), Some(52.52));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod clock;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use constants::*;
pub use error::{FetchError, ProxyError, Result};
pub use traits::*;
pub use types::*;
