//! Domain types for skyproxy.
//!
//! - [`WeatherPayload`]: the upstream forecast, passed through verbatim

mod payload;

pub use payload::*;
