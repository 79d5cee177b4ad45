//! Upstream forecast client for skyproxy.
//!
//! Performs a single GET against the configured Open-Meteo URL and sorts
//! failures into transport, timeout, HTTP status and payload errors.

mod open_meteo;

pub use open_meteo::{OpenMeteoClient, UpstreamConfig};
