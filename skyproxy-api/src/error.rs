//! API error handling.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use skyproxy_core::error::ProxyError;

/// Non-standard status for a client that went away mid-request.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    /// 429 with a `Retry-After` of at least one second.
    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self {
            retry_after_secs: Some(retry_after_secs.max(1)),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                "Rate limit exceeded. Please try again later.",
            )
        }
    }

    /// Upstream unreachable or too slow.
    pub fn gateway_timeout() -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            "Gateway timeout",
            "Unable to reach weather service. Please try again later.",
        )
    }

    /// Upstream answered with an error status.
    pub fn bad_gateway() -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "Bad gateway",
            "Weather service returned an error. Please try again later.",
        )
    }

    /// Internal server error.
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            "An unexpected error occurred. Please try again later.",
        )
    }

    /// The caller stopped waiting.
    pub fn client_closed() -> Self {
        let status =
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::REQUEST_TIMEOUT);
        Self::new(status, "Client closed request", "Request cancelled.")
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.error.to_string(),
            message: self.message,
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match &err {
            ProxyError::RateLimitExceeded {
                client_id,
                retry_after_secs,
            } => {
                warn!(ip = %client_id, retry_after_secs, "Rate limit exceeded for IP address");
                ApiError::too_many_requests(*retry_after_secs)
            }
            ProxyError::Fetch(fetch) if fetch.is_gateway_timeout() => {
                error!(error = %err, "Timeout or network error when calling upstream");
                ApiError::gateway_timeout()
            }
            ProxyError::WaitTimeout { .. } => {
                error!(error = %err, "Gave up waiting for upstream");
                ApiError::gateway_timeout()
            }
            ProxyError::Fetch(fetch) if fetch.is_upstream_status() => {
                error!(error = %err, "HTTP error from upstream");
                ApiError::bad_gateway()
            }
            ProxyError::Cancelled => {
                debug!("Request cancelled while waiting for upstream");
                ApiError::client_closed()
            }
            _ => {
                error!(error = %err, "Unexpected error in weather endpoint");
                ApiError::internal()
            }
        }
    }
}
