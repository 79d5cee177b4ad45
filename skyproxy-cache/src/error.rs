//! Cache error type.

use thiserror::Error;

use skyproxy_core::error::{FetchError, ProxyError};

/// Error returned by [`SingleFlightCache`](crate::SingleFlightCache) lookups.
///
/// `E` is the fetch error type. It is cloned once per waiter, so every
/// caller attached to a failed fetch observes the same failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CacheError<E> {
    /// The fetch itself failed; nothing was stored.
    #[error("{0}")]
    Fetch(E),

    /// This caller was cancelled while waiting. The fetch keeps running.
    #[error("cancelled while waiting for in-flight fetch")]
    Cancelled,

    /// This caller hit its wait bound. The fetch keeps running.
    #[error("gave up after {}s waiting for in-flight fetch", .0.as_secs())]
    WaitTimeout(std::time::Duration),

    /// The fetch task panicked or was torn down with the runtime.
    #[error("fetch aborted: {0}")]
    Aborted(String),
}

impl<E> CacheError<E> {
    /// Returns the fetch error, if this is one.
    pub fn fetch_error(&self) -> Option<&E> {
        match self {
            CacheError::Fetch(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if only this caller was affected.
    pub fn is_local_to_caller(&self) -> bool {
        matches!(self, CacheError::Cancelled | CacheError::WaitTimeout(_))
    }
}

impl From<CacheError<FetchError>> for ProxyError {
    fn from(err: CacheError<FetchError>) -> Self {
        match err {
            CacheError::Fetch(inner) => ProxyError::Fetch(inner),
            CacheError::Cancelled => ProxyError::Cancelled,
            CacheError::WaitTimeout(waited) => ProxyError::WaitTimeout {
                seconds: waited.as_secs(),
            },
            CacheError::Aborted(reason) => ProxyError::FetchAborted(reason),
        }
    }
}
