//! The PDP HTTP client.
//!
//! Shapes request envelopes, retries with backoff, and classifies failures
//! into the exported error surface. Stale-cache fallback is the
//! orchestrator's job; the client only reports what happened upstream.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use dike_config::Endpoints;
use dike_types::error::{STATUS_DNS, STATUS_TEMPORARY, STATUS_TIMEOUT};
use dike_types::{ApiError, PepError, PepResult, RoleActions};

use crate::transport::{Transport, TransportError, TransportRequest};
use crate::wire::{AuthzEnvelope, AuthzItem, BulkEnvelope, BulkRequest, RolesItem};

/// The version advertised in the `pep-version` header.
pub const PEP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Retries allowed per trigger class within one logical call.
const MAX_RETRIES_PER_CLASS: u32 = 3;

/// `X-Request-Count` value when a sub-request count is not meaningful.
const DEFAULT_REQUEST_COUNT: usize = 10;

/// Cap on response-body text copied into error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// What a retry was triggered by. Each class gets its own budget.
#[derive(Debug, Clone, Copy)]
enum RetryClass {
    Timeout,
    RateLimited,
    Server,
}

#[derive(Debug, Default)]
struct RetryBudget {
    timeout: u32,
    rate_limited: u32,
    server: u32,
}

impl RetryBudget {
    fn try_spend(&mut self, class: RetryClass) -> bool {
        let counter = match class {
            RetryClass::Timeout => &mut self.timeout,
            RetryClass::RateLimited => &mut self.rate_limited,
            RetryClass::Server => &mut self.server,
        };
        if *counter < MAX_RETRIES_PER_CLASS {
            *counter += 1;
            true
        } else {
            false
        }
    }
}

/// A parsed envelope together with how many retries it took.
#[derive(Debug)]
pub struct CallOutcome<T> {
    /// The decoded response body.
    pub envelope: T,
    /// Number of retried attempts behind this response.
    pub retry_count: u32,
}

/// HTTP client for the PDP endpoints.
pub struct PdpClient {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    retry_enabled: bool,
}

impl std::fmt::Debug for PdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdpClient")
            .field("endpoints", &self.endpoints)
            .field("retry_enabled", &self.retry_enabled)
            .finish_non_exhaustive()
    }
}

impl PdpClient {
    /// Create a client over the given transport and endpoint set.
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints, retry_enabled: bool) -> Self {
        Self {
            transport,
            endpoints,
            retry_enabled,
        }
    }

    /// The endpoint set this client targets.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Issue a per-item authz call.
    ///
    /// The whole batch fails atomically: any sub-response with a non-`"200"`
    /// status turns into an [`ApiError`] carrying the first failing index's
    /// status and concatenated error messages.
    pub async fn authz(
        &self,
        items: &[AuthzItem],
        trace: &str,
        token: &str,
    ) -> PepResult<CallOutcome<AuthzEnvelope>> {
        let url = self.endpoints.authz.clone();
        let outcome: CallOutcome<AuthzEnvelope> = self
            .call(Method::POST, &url, items, trace, token, items.len())
            .await?;

        if outcome.envelope.responses.len() != items.len() {
            return Err(ApiError::new(
                200,
                &url,
                trace,
                format!(
                    "authz envelope has {} responses for {} sub-requests",
                    outcome.envelope.responses.len(),
                    items.len()
                ),
            )
            .into());
        }
        Self::check_sub_status(&outcome.envelope, &url, trace)?;
        Ok(outcome)
    }

    /// Issue a bulk list call.
    pub async fn bulk(
        &self,
        request: &BulkRequest,
        trace: &str,
        token: &str,
    ) -> PepResult<CallOutcome<BulkEnvelope>> {
        let url = self.endpoints.bulk.clone();
        let count = request.resources.unique_attributes.len();
        let outcome: CallOutcome<BulkEnvelope> = self
            .call(Method::PUT, &url, request, trace, token, count)
            .await?;

        if outcome.envelope.decisions.len() != count {
            return Err(ApiError::new(
                200,
                &url,
                trace,
                format!(
                    "bulk envelope has {} decisions for {} resources",
                    outcome.envelope.decisions.len(),
                    count
                ),
            )
            .into());
        }
        Ok(outcome)
    }

    /// Issue a roles call.
    pub async fn roles(
        &self,
        items: &[RolesItem],
        trace: &str,
        token: &str,
    ) -> PepResult<CallOutcome<Vec<RoleActions>>> {
        let url = self.endpoints.roles.clone();
        self.call(Method::POST, &url, items, trace, token, items.len())
            .await
    }

    fn check_sub_status(envelope: &AuthzEnvelope, url: &str, trace: &str) -> PepResult<()> {
        for item in &envelope.responses {
            if item.status != "200" {
                let status = item.status.parse::<u16>().unwrap_or(500);
                let message = match &item.error {
                    Some(errors) if !errors.is_empty() => errors.join("; "),
                    _ => format!("sub-request failed with status {}", item.status),
                };
                return Err(ApiError::new(status, url, trace, message).into());
            }
        }
        Ok(())
    }

    fn headers(&self, trace: &str, token: &str, sub_count: usize) -> Vec<(String, String)> {
        let count = if sub_count == 0 {
            DEFAULT_REQUEST_COUNT
        } else {
            sub_count
        };
        vec![
            ("Authorization".to_string(), format!("Bearer {token}")),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("transaction-id".to_string(), trace.to_string()),
            ("X-Accept-Advanced-Obligation".to_string(), "true".to_string()),
            ("pep-version".to_string(), PEP_VERSION.to_string()),
            ("X-Request-Count".to_string(), count.to_string()),
        ]
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &B,
        trace: &str,
        token: &str,
        sub_count: usize,
    ) -> PepResult<CallOutcome<T>> {
        let body = serde_json::to_string(body)
            .map_err(|e| PepError::internal(trace, format!("failed to encode request: {e}")))?;
        let headers = self.headers(trace, token, sub_count);
        let header_map: BTreeMap<String, String> = headers.iter().cloned().collect();

        let mut budget = RetryBudget::default();
        let mut retries = 0u32;

        loop {
            let request = TransportRequest {
                method: method.clone(),
                url: url.to_string(),
                headers: headers.clone(),
                body: body.clone(),
            };

            let (error, class, retry_after) = match self.transport.send(request).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    let envelope: T = serde_json::from_str(&response.body).map_err(|e| {
                        ApiError::new(
                            response.status,
                            url,
                            trace,
                            format!("failed to decode response body: {e}"),
                        )
                        .with_request_headers(header_map.clone())
                        .with_response_headers(response.headers.clone())
                    })?;
                    debug!(url, retries, "pdp call succeeded");
                    return Ok(CallOutcome {
                        envelope,
                        retry_count: retries,
                    });
                }
                Ok(response) => {
                    let class = if response.status == 429 {
                        Some(RetryClass::RateLimited)
                    } else if response.status >= 500 {
                        Some(RetryClass::Server)
                    } else {
                        None
                    };
                    let mut message = response.body.clone();
                    message.truncate(ERROR_BODY_LIMIT);
                    let error = ApiError::new(response.status, url, trace, message)
                        .with_request_headers(header_map.clone())
                        .with_response_headers(response.headers.clone());
                    (error, class, response.retry_after())
                }
                Err(transport_error) => {
                    let (status, class) = match &transport_error {
                        TransportError::Timeout => (STATUS_TIMEOUT, Some(RetryClass::Timeout)),
                        TransportError::Dns(_) => (STATUS_DNS, Some(RetryClass::Server)),
                        TransportError::Temporary(_) => {
                            (STATUS_TEMPORARY, Some(RetryClass::Server))
                        }
                        TransportError::Other(_) => (0, None),
                    };
                    let error = ApiError::new(status, url, trace, transport_error.to_string())
                        .with_request_headers(header_map.clone());
                    (error, class, None)
                }
            };

            let should_retry = self.retry_enabled
                && class.is_some_and(|class| budget.try_spend(class));
            if !should_retry {
                warn!(url, status = error.status_code, retries, "pdp call failed");
                return Err(error.into());
            }

            retries += 1;
            let delay = retry_after.unwrap_or_else(|| Duration::from_secs(u64::from(retries)));
            debug!(
                url,
                status = error.status_code,
                retry = retries,
                delay_secs = delay.as_secs(),
                "retrying pdp call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use dike_config::Environment;
    use dike_types::AttributeBag;

    use super::*;
    use crate::classify::to_authz_items;
    use crate::transport::TransportResponse;
    use dike_types::Request;

    /// Transport stub answering from a script and recording requests.
    struct StubTransport {
        script: Mutex<Vec<Result<TransportResponse, TransportError>>>,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl StubTransport {
        fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn ok(body: &str) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: 200,
                headers: BTreeMap::new(),
                body: body.to_string(),
            })
        }

        fn status(code: u16) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: code,
                headers: BTreeMap::new(),
                body: format!("status {code}"),
            })
        }

        fn status_with_retry_after(code: u16, seconds: u64) -> Result<TransportResponse, TransportError> {
            let mut headers = BTreeMap::new();
            headers.insert("Retry-After".to_string(), seconds.to_string());
            Ok(TransportResponse {
                status: code,
                headers,
                body: format!("status {code}"),
            })
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            let mut script = self.script.lock().unwrap();
            assert!(!script.is_empty(), "stub transport script exhausted");
            script.remove(0)
        }
    }

    fn client(stub: StubTransport, retry: bool) -> PdpClient {
        PdpClient::new(
            Arc::new(stub),
            Environment::Staging.endpoints().unwrap(),
            retry,
        )
    }

    fn items() -> Vec<AuthzItem> {
        let request = Request::new(
            "books.read",
            AttributeBag::new().with("id", "U"),
            AttributeBag::new().with("serviceName", "books"),
        );
        to_authz_items(&[request])
    }

    const PERMIT_BODY: &str = r#"{
        "responses": [{
            "status": "200",
            "authorizationDecision": {"permitted": true}
        }]
    }"#;

    #[tokio::test]
    async fn test_success_carries_headers() {
        let stub = StubTransport::new(vec![StubTransport::ok(PERMIT_BODY)]);
        let pdp = client(stub, false);

        let outcome = pdp.authz(&items(), "trace-1", "tok").await.unwrap();
        assert_eq!(outcome.retry_count, 0);
        assert!(outcome.envelope.responses[0]
            .authorization_decision
            .as_ref()
            .unwrap()
            .permitted);
    }

    #[tokio::test]
    async fn test_envelope_headers_shape() {
        let transport = Arc::new(StubTransport::new(vec![StubTransport::ok(PERMIT_BODY)]));
        let pdp = PdpClient::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Environment::Staging.endpoints().unwrap(),
            false,
        );
        pdp.authz(&items(), "trace-9", "secret-token").await.unwrap();

        let seen = transport.seen.lock().unwrap();
        let headers: BTreeMap<_, _> = seen[0].headers.iter().cloned().collect();
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer secret-token");
        assert_eq!(headers.get("transaction-id").unwrap(), "trace-9");
        assert_eq!(headers.get("X-Accept-Advanced-Obligation").unwrap(), "true");
        assert_eq!(headers.get("X-Request-Count").unwrap(), "1");
        assert_eq!(headers.get("pep-version").unwrap(), PEP_VERSION);
        assert_eq!(seen[0].method, Method::POST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_sequence_spans_classes() {
        // 500, 500, 502 exhaust nothing yet; 429 with Retry-After uses its
        // own budget; the fifth attempt succeeds with four retries total.
        let stub = StubTransport::new(vec![
            StubTransport::status(500),
            StubTransport::status(500),
            StubTransport::status(502),
            StubTransport::status_with_retry_after(429, 2),
            StubTransport::ok(PERMIT_BODY),
        ]);
        let pdp = client(stub, true);

        let outcome = pdp.authz(&items(), "trace-r", "tok").await.unwrap();
        assert_eq!(outcome.retry_count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_exhausted() {
        let stub = StubTransport::new(vec![
            StubTransport::status(503),
            StubTransport::status(503),
            StubTransport::status(503),
            StubTransport::status(503),
        ]);
        let pdp = client(stub, true);

        let err = pdp.authz(&items(), "trace-x", "tok").await.unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.status_code, 503);
    }

    #[tokio::test]
    async fn test_no_retry_when_disabled() {
        let stub = StubTransport::new(vec![StubTransport::status(500)]);
        let pdp = client(stub, false);

        let err = pdp.authz(&items(), "trace-n", "tok").await.unwrap_err();
        assert_eq!(err.as_api().unwrap().status_code, 500);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let stub = StubTransport::new(vec![StubTransport::status(403)]);
        let pdp = client(stub, true);

        let err = pdp.authz(&items(), "trace-f", "tok").await.unwrap_err();
        assert_eq!(err.as_api().unwrap().status_code, 403);
    }

    #[tokio::test]
    async fn test_transport_errors_map_to_synthetic_codes() {
        for (error, expected) in [
            (TransportError::Timeout, STATUS_TIMEOUT),
            (TransportError::Temporary("reset".into()), STATUS_TEMPORARY),
            (TransportError::Dns("no such host".into()), STATUS_DNS),
            (TransportError::Other("boom".into()), 0),
        ] {
            let stub = StubTransport::new(vec![Err(error)]);
            let pdp = client(stub, false);
            let err = pdp.authz(&items(), "trace-t", "tok").await.unwrap_err();
            assert_eq!(err.as_api().unwrap().status_code, expected);
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_api_error() {
        let stub = StubTransport::new(vec![StubTransport::ok("not json at all")]);
        let pdp = client(stub, false);

        let err = pdp.authz(&items(), "trace-m", "tok").await.unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.status_code, 200);
        assert!(api.message.contains("decode"));
    }

    #[tokio::test]
    async fn test_sub_status_failure_fails_whole_batch() {
        let body = r#"{
            "responses": [
                {"status": "200", "authorizationDecision": {"permitted": true}},
                {"status": "403", "error": ["bad subject", "missing scope"]}
            ]
        }"#;
        let request = Request::new(
            "books.read",
            AttributeBag::new().with("id", "U"),
            AttributeBag::new().with("serviceName", "books"),
        );
        let two = to_authz_items(&[request.clone(), request]);

        let stub = StubTransport::new(vec![StubTransport::ok(body)]);
        let pdp = client(stub, false);

        let err = pdp.authz(&two, "trace-s", "tok").await.unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.status_code, 403);
        assert_eq!(api.message, "bad subject; missing scope");
    }

    #[tokio::test]
    async fn test_response_count_mismatch_is_rejected() {
        let stub = StubTransport::new(vec![StubTransport::ok(r#"{"responses": []}"#)]);
        let pdp = client(stub, false);

        let err = pdp.authz(&items(), "trace-c", "tok").await.unwrap_err();
        assert!(err.as_api().unwrap().message.contains("responses"));
    }
}
