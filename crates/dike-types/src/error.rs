//! Error surface of the PEP.
//!
//! Two shapes cross the public boundary: [`ApiError`] for transport/PDP
//! failures and [`InternalError`] for caller mistakes. [`PepError`] wraps
//! both so library code can propagate with `?`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`PepError`].
pub type PepResult<T> = Result<T, PepError>;

/// Synthetic status code for transport timeouts.
pub const STATUS_TIMEOUT: u16 = 504;

/// Synthetic status code for temporary network errors.
pub const STATUS_TEMPORARY: u16 = 502;

/// Internal sentinel status code for DNS resolution failures.
pub const STATUS_DNS: u16 = 999;

/// A failure talking to the PDP, or reported by it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("PDP request to {endpoint_uri} failed (status {status_code}, trace {trace}): {message}")]
pub struct ApiError {
    /// HTTP status, a synthetic code (504/502), or the DNS sentinel (999).
    /// Zero when no response was obtained at all.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// The resolved endpoint the call targeted.
    #[serde(rename = "endpointURI")]
    pub endpoint_uri: String,
    /// Trace id the call ran under.
    pub trace: String,
    /// Human-readable failure description.
    pub message: String,
    /// Headers sent with the failing request.
    #[serde(rename = "requestHeaders", default)]
    pub request_headers: BTreeMap<String, String>,
    /// Headers received on the failing response, when one arrived.
    #[serde(rename = "responseHeaders", default)]
    pub response_headers: BTreeMap<String, String>,
}

impl ApiError {
    /// Create an error with empty header maps.
    pub fn new(
        status_code: u16,
        endpoint_uri: impl Into<String>,
        trace: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            endpoint_uri: endpoint_uri.into(),
            trace: trace.into(),
            message: message.into(),
            request_headers: BTreeMap::new(),
            response_headers: BTreeMap::new(),
        }
    }

    /// Attach the request headers of the failing call.
    #[must_use]
    pub fn with_request_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.request_headers = headers;
        self
    }

    /// Attach the response headers of the failing call.
    #[must_use]
    pub fn with_response_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.response_headers = headers;
        self
    }

    /// Whether a retry-enabled client may re-issue the call.
    pub const fn is_retryable(&self) -> bool {
        self.status_code == STATUS_TIMEOUT
            || self.status_code == 429
            || self.status_code >= 500
    }

    /// Whether the failure qualifies for serving expired cache entries:
    /// no response at all, or an upstream 5xx-class failure.
    pub const fn is_stale_eligible(&self) -> bool {
        self.status_code == 0 || self.status_code >= 500
    }
}

/// A caller error: the request never reached the cache or the PDP.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("internal error (trace {trace}): {message}")]
pub struct InternalError {
    /// Trace id the call ran under.
    pub trace: String,
    /// Human-readable description of the caller mistake.
    pub message: String,
}

impl InternalError {
    /// Create an internal error.
    pub fn new(trace: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            trace: trace.into(),
            message: message.into(),
        }
    }
}

/// Any failure of a PEP operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PepError {
    /// Transport or PDP failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Caller error.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl PepError {
    /// Shorthand for a caller error.
    pub fn internal(trace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal(InternalError::new(trace, message))
    }

    /// The wrapped [`ApiError`], if this is one.
    pub const fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            Self::Internal(_) => None,
        }
    }
}
