//! The HTTP transport seam.
//!
//! The PDP client shapes requests and classifies failures; the transport
//! only moves bytes. Production uses [`ReqwestTransport`]; tests inject a
//! scripted stub. Callers can supply their own through configuration, e.g.
//! to add proxies or instrumentation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use thiserror::Error;

/// A transport-level failure: no usable HTTP response was obtained.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The call exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Name resolution failed.
    #[error("dns resolution failed: {0}")]
    Dns(String),

    /// A temporary network failure (connect refused, reset, ...).
    #[error("temporary network error: {0}")]
    Temporary(String),

    /// Anything else.
    #[error("transport error: {0}")]
    Other(String),
}

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Headers, in insertion order.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: String,
}

/// An HTTP response as the client sees it.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Raw body.
    pub body: String,
}

impl TransportResponse {
    /// The `Retry-After` delay, when the response carries a parseable one.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get("Retry-After")
            .or_else(|| self.headers.get("retry-after"))
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Moves one HTTP request to the PDP and back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the round-trip.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// The default transport, backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose calls time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }

    fn classify(error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout;
        }
        let chain = format!("{error:?}").to_lowercase();
        if chain.contains("dns") {
            return TransportError::Dns(error.to_string());
        }
        if error.is_connect() {
            return TransportError::Temporary(error.to_string());
        }
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| Self::classify(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(&e))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
