//! Authenticated request executor
//!
//! Attaches the developer id and access token to every call and classifies
//! the response. The credential store is read at send time, so a token
//! captured by a re-authentication is picked up by the very next attempt.

use std::sync::Arc;

use iijmio_auth::CredentialStore;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, Transport};

/// Coupon resource of the IIJmio API.
pub const COUPON_ENDPOINT: &str = "https://api.iijmio.jp/mobile/d/v1/coupon/";

const DEVELOPER_HEADER: &str = "x-iijmio-developer";
const AUTHORIZATION_HEADER: &str = "x-iijmio-authorization";

/// Longest slice of an error body carried into `RequestFailed`.
const MAX_CAUSE_LEN: usize = 256;

/// Outcome class of an API status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// 403: the token is missing, expired, or revoked
    AuthorizationExpired,
    Failed,
}

pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        200 => ResponseClass::Success,
        403 => ResponseClass::AuthorizationExpired,
        _ => ResponseClass::Failed,
    }
}

pub struct Executor {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    coupon_url: String,
}

impl Executor {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        coupon_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            coupon_url: coupon_url.into(),
        }
    }

    /// Send one request to the coupon endpoint and return the raw 200 body.
    ///
    /// Fails with `MissingDeveloperId` before touching the transport, and with
    /// `AuthorizationExpired` on 403. Never retries.
    #[instrument(skip_all, fields(op_id = %format!("op_{}", uuid::Uuid::new_v4().as_simple()), method = %method))]
    pub async fn execute(&self, method: Method, body: Option<String>) -> Result<String> {
        let credential = self.credentials.load().await;
        let developer_id = credential.developer_id().ok_or(Error::MissingDeveloperId)?;
        if credential.access_token().is_none() {
            debug!("no access token yet, expecting 403");
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(DEVELOPER_HEADER, header_value("developer id", developer_id)?);
        headers.insert(
            AUTHORIZATION_HEADER,
            header_value("access token", credential.access_token().unwrap_or_default())?,
        );

        let request = ApiRequest {
            method: method.clone(),
            url: self.coupon_url.clone(),
            headers,
            body,
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                record_request(&method, "error");
                warn!(error = %e, "coupon API unreachable");
                return Err(e);
            }
        };
        record_request(&method, &response.status.to_string());

        match classify_status(response.status) {
            ResponseClass::Success => {
                debug!(bytes = response.body.len(), "coupon API call succeeded");
                Ok(response.body)
            }
            ResponseClass::AuthorizationExpired => {
                debug!("coupon API rejected the access token");
                Err(Error::AuthorizationExpired)
            }
            ResponseClass::Failed => {
                warn!(status = response.status, "coupon API call failed");
                Err(Error::RequestFailed {
                    status: Some(response.status),
                    cause: truncate(&response.body),
                })
            }
        }
    }
}

fn header_value(what: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::RequestFailed {
        status: None,
        cause: format!("{what} contains characters not allowed in a header"),
    })
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_CAUSE_LEN {
        return body.to_string();
    }
    let mut end = MAX_CAUSE_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn record_request(method: &Method, status: &str) {
    metrics::counter!(
        "coupon_api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ApiResponse, BoxFuture};
    use iijmio_auth::MemoryCredentialStore;
    use std::sync::Mutex;

    /// Records every request and answers with a fixed response.
    struct RecordingTransport {
        response: std::result::Result<ApiResponse, (Option<u16>, String)>,
        seen: Mutex<Vec<ApiRequest>>,
    }

    impl RecordingTransport {
        fn answering(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(ApiResponse {
                    status,
                    body: body.into(),
                }),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(cause: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err((None, cause.into())),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
            self.seen.lock().unwrap().push(request);
            let response = self
                .response
                .clone()
                .map_err(|(status, cause)| Error::RequestFailed { status, cause });
            Box::pin(async move { response })
        }
    }

    fn executor(transport: Arc<RecordingTransport>, store: MemoryCredentialStore) -> Executor {
        Executor::new(transport, Arc::new(store), COUPON_ENDPOINT)
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(classify_status(200), ResponseClass::Success);
        assert_eq!(classify_status(403), ResponseClass::AuthorizationExpired);
        assert_eq!(classify_status(401), ResponseClass::Failed);
        assert_eq!(classify_status(204), ResponseClass::Failed);
        assert_eq!(classify_status(500), ResponseClass::Failed);
    }

    #[tokio::test]
    async fn sends_auth_headers_and_returns_body() {
        let transport = RecordingTransport::answering(200, "{\"couponInfo\":[]}");
        let store = MemoryCredentialStore::new(Some("dev-1".into())).with_access_token("TOK123");

        let body = executor(transport.clone(), store)
            .execute(Method::GET, None)
            .await
            .unwrap();
        assert_eq!(body, "{\"couponInfo\":[]}");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, COUPON_ENDPOINT);
        assert_eq!(request.headers["content-type"], "application/json");
        assert_eq!(request.headers["x-iijmio-developer"], "dev-1");
        assert_eq!(request.headers["x-iijmio-authorization"], "TOK123");
    }

    #[tokio::test]
    async fn missing_developer_id_sends_nothing() {
        let transport = RecordingTransport::answering(200, "");
        let result = executor(transport.clone(), MemoryCredentialStore::new(None))
            .execute(Method::GET, None)
            .await;

        assert!(matches!(result, Err(Error::MissingDeveloperId)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_token_sends_empty_authorization() {
        let transport = RecordingTransport::answering(403, "");
        let result = executor(transport.clone(), MemoryCredentialStore::new(Some("dev-1".into())))
            .execute(Method::GET, None)
            .await;

        assert!(matches!(result, Err(Error::AuthorizationExpired)));
        assert_eq!(transport.requests()[0].headers["x-iijmio-authorization"], "");
    }

    #[tokio::test]
    async fn other_status_is_request_failed() {
        let transport = RecordingTransport::answering(503, "maintenance");
        let store = MemoryCredentialStore::new(Some("dev-1".into())).with_access_token("TOK");

        match executor(transport, store).execute(Method::PUT, Some("{}".into())).await {
            Err(Error::RequestFailed { status, cause }) => {
                assert_eq!(status, Some(503));
                assert_eq!(cause, "maintenance");
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn network_error_passes_through() {
        let transport = RecordingTransport::failing("connection refused");
        let store = MemoryCredentialStore::new(Some("dev-1".into())).with_access_token("TOK");

        let result = executor(transport, store).execute(Method::GET, None).await;
        assert!(matches!(
            result,
            Err(Error::RequestFailed { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn put_body_is_forwarded() {
        let transport = RecordingTransport::answering(200, "ok");
        let store = MemoryCredentialStore::new(Some("dev-1".into())).with_access_token("TOK");

        executor(transport.clone(), store)
            .execute(Method::PUT, Some("{\"x\":1}".into()))
            .await
            .unwrap();
        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.body.as_deref(), Some("{\"x\":1}"));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let cause = truncate(&body);
        assert_eq!(cause.len(), MAX_CAUSE_LEN + 3);
        assert!(cause.ends_with("..."));
    }

    #[test]
    fn record_request_does_not_panic_without_recorder() {
        record_request(&Method::GET, "200");
    }
}
