//! Client identity used as the rate limit key.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use skyproxy_core::constants::UNKNOWN_CLIENT_ID;

use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The requesting client's IP address, or `"unknown"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientId(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientId(resolve_client_id(
            &parts.headers,
            peer,
            state.config.trust_forwarded_for,
        )))
    }
}

/// Picks the rate limit key for a request.
///
/// With `trust_forwarded_for`, the first well-formed address in
/// `X-Forwarded-For` wins. Otherwise the peer IP is used, without its port.
/// Requests with neither share the `"unknown"` bucket.
pub fn resolve_client_id(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_ip(headers) {
            return ip.to_string();
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT_ID.to_string(),
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
