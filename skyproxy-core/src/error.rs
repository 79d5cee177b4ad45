//! Error types for skyproxy.
//!
//! [`FetchError`] describes a failed upstream call. It is `Clone` because a
//! single failed fetch is handed to every request that was waiting on it.
//! [`ProxyError`] is the crate-wide error used everywhere else.

use thiserror::Error;

/// Result type alias using `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Failure of a single upstream fetch.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The upstream could not be reached, or the connection broke mid-body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The upstream did not answer within the configured timeout.
    #[error("Upstream timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The upstream answered with a non-success HTTP status.
    #[error("Upstream returned HTTP {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// The upstream body could not be decoded into a forecast payload.
    #[error("Invalid upstream payload: {0}")]
    Parse(String),
}

impl FetchError {
    /// Returns true for failures that mean the upstream was unreachable.
    pub fn is_gateway_timeout(&self) -> bool {
        matches!(self, FetchError::Transport(_) | FetchError::Timeout { .. })
    }

    /// Returns true if the upstream was reached and rejected the request.
    pub fn is_upstream_status(&self) -> bool {
        matches!(self, FetchError::UpstreamStatus { .. })
    }

    /// Short machine-readable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Timeout { .. } => "timeout",
            FetchError::UpstreamStatus { .. } => "upstream_status",
            FetchError::Parse(_) => "parse",
        }
    }
}

/// Main error type for all skyproxy operations.
#[derive(Debug, Error)]
pub enum ProxyError {
    // ═══════════════════════════════════════════════════════════════════════════
    // REQUEST PIPELINE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The client used up its quota for the current window.
    #[error("Rate limit exceeded for client '{client_id}', retry in {retry_after_secs}s")]
    RateLimitExceeded { client_id: String, retry_after_secs: u64 },

    /// The upstream fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The caller stopped waiting on an in-flight fetch.
    #[error("Request cancelled while waiting for upstream data")]
    Cancelled,

    /// The caller gave up waiting on an in-flight fetch.
    #[error("Timed out after {seconds}s waiting for upstream data")]
    WaitTimeout { seconds: u64 },

    /// The fetch task died before producing a result.
    #[error("Upstream fetch aborted: {0}")]
    FetchAborted(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STARTUP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error (binding the listener, reading `.env`).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ProxyError {
    /// Returns true if a later request may succeed without operator action.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ProxyError::RateLimitExceeded { .. }
            | ProxyError::Cancelled
            | ProxyError::WaitTimeout { .. } => true,
            ProxyError::Fetch(err) => err.is_gateway_timeout() || err.is_upstream_status(),
            _ => false,
        }
    }

    /// Returns true if this error originated upstream.
    pub fn is_upstream_error(&self) -> bool {
        matches!(self, ProxyError::Fetch(_) | ProxyError::FetchAborted(_))
    }
}
