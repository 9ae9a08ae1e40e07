//! Single outbound call with deadline and retry.
//!
//! # Responsibilities
//! - Build the outbound request (target URI, merged headers, body)
//! - Enforce the endpoint's per-attempt deadline
//! - Retry per the resilience policy, never beyond the configured count
//! - Classify failures into the `CallError` taxonomy

use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::resilience::{backoff, retries};
use crate::store::model::Endpoint;
use crate::upstream::pool::UpstreamPool;

/// The inbound request as seen by outbound dispatch. Cheap to clone; the
/// body is reference-counted.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Path and query to forward when the endpoint has no path override.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One backend response. Cloning is cheap; the body is reference-counted.
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub duration: Duration,
}

/// Outcome classification for a failed call. Upstream components apply
/// different policies per variant, so the distinction is part of the
/// contract.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    #[error("upstream call timed out")]
    Timeout,

    #[error("upstream connection failed: {0}")]
    ConnectionFailed(String),

    #[error("backend returned status {status}")]
    BackendError { status: u16, body: Bytes },
}

impl CallError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::BackendError { .. } => "backend_error",
        }
    }
}

/// Issues outbound calls through a shared client and the bounded pool.
pub struct EndpointCaller {
    client: Client<HttpConnector, Body>,
    pool: UpstreamPool,
    retry_base_delay_ms: u64,
    retry_max_delay_ms: u64,
    max_body_bytes: usize,
}

impl EndpointCaller {
    pub fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            pool: UpstreamPool::new(config.pool_size_per_endpoint),
            retry_base_delay_ms: config.retry_base_delay_ms,
            retry_max_delay_ms: config.retry_max_delay_ms,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Call the endpoint, retrying up to its configured count. A 2xx
    /// response is success; anything else surfaces as a `CallError` after
    /// the retry policy is exhausted.
    pub async fn call(
        &self,
        endpoint: &Endpoint,
        request: &CallRequest,
    ) -> Result<CallResponse, CallError> {
        let _permit = self.pool.acquire(endpoint.id).await;
        let uri = target_uri(endpoint, &request.path)?;
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let error = match self.attempt(endpoint, &uri, request).await {
                Ok((status, headers, body)) => {
                    if status.is_success() {
                        metrics::record_upstream_attempt(&endpoint.name, "success");
                        return Ok(CallResponse {
                            status,
                            headers,
                            body,
                            duration: started.elapsed(),
                        });
                    }
                    CallError::BackendError {
                        status: status.as_u16(),
                        body,
                    }
                }
                Err(e) => e,
            };

            metrics::record_upstream_attempt(&endpoint.name, error.kind());

            if attempt > endpoint.retry_count || !retries::is_retryable(&error) {
                return Err(error);
            }

            let delay = backoff::retry_delay(attempt, self.retry_base_delay_ms, self.retry_max_delay_ms);
            tracing::debug!(
                endpoint = %endpoint.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying upstream call"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt: dispatch and read the full response body, all under the
    /// endpoint's deadline.
    async fn attempt(
        &self,
        endpoint: &Endpoint,
        uri: &Uri,
        request: &CallRequest,
    ) -> Result<(StatusCode, HeaderMap, Bytes), CallError> {
        let mut builder = Request::builder()
            .method(endpoint.method.to_wire())
            .uri(uri.clone());

        if let Some(headers) = builder.headers_mut() {
            *headers = outbound_headers(endpoint, &request.headers);
        }

        let req = builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| CallError::ConnectionFailed(e.to_string()))?;

        let deadline = Duration::from_millis(endpoint.timeout_ms);
        let exchange = async {
            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| CallError::ConnectionFailed(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
                .await
                .map_err(|e| CallError::ConnectionFailed(e.to_string()))?;
            Ok::<_, CallError>((parts.status, parts.headers, bytes))
        };

        match tokio::time::timeout(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout),
        }
    }
}

/// Inbound headers carried through, endpoint-configured headers applied on
/// top (explicit configuration overrides same-named inbound values).
/// Hop-by-hop framing headers are recomputed for the outbound call.
fn outbound_headers(endpoint: &Endpoint, inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound.iter() {
        if name == header::HOST || name == header::CONTENT_LENGTH || name == header::CONNECTION {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    for (name, value) in &endpoint.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => {
                tracing::warn!(
                    endpoint = %endpoint.name,
                    header = %name,
                    "skipping invalid configured header"
                );
            }
        }
    }
    headers
}

fn target_uri(endpoint: &Endpoint, inbound_path: &str) -> Result<Uri, CallError> {
    let base = Url::parse(&endpoint.base_url)
        .map_err(|e| CallError::ConnectionFailed(format!("invalid base url: {e}")))?;
    let path = endpoint.path.as_deref().unwrap_or(inbound_path);
    let target = base
        .join(path)
        .map_err(|e| CallError::ConnectionFailed(format!("invalid target path: {e}")))?;
    target
        .as_str()
        .parse::<Uri>()
        .map_err(|e| CallError::ConnectionFailed(format!("invalid target uri: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::HttpMethod;

    fn endpoint_with_headers(headers: &[(&str, &str)]) -> Endpoint {
        Endpoint {
            id: 1,
            name: "test".into(),
            base_url: "http://127.0.0.1:9000".into(),
            path: None,
            method: HttpMethod::Get,
            timeout_ms: 1_000,
            retry_count: 0,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            active: true,
        }
    }

    #[test]
    fn configured_headers_override_inbound() {
        let endpoint = endpoint_with_headers(&[("x-api-key", "configured")]);
        let mut inbound = HeaderMap::new();
        inbound.insert("x-api-key", HeaderValue::from_static("client"));
        inbound.insert("x-trace", HeaderValue::from_static("abc"));

        let merged = outbound_headers(&endpoint, &inbound);
        assert_eq!(merged.get("x-api-key").unwrap(), "configured");
        assert_eq!(merged.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn framing_headers_are_stripped() {
        let endpoint = endpoint_with_headers(&[]);
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));

        let merged = outbound_headers(&endpoint, &inbound);
        assert!(merged.get(header::HOST).is_none());
        assert!(merged.get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn target_uri_prefers_endpoint_path_override() {
        let mut endpoint = endpoint_with_headers(&[]);
        endpoint.path = Some("/v2/users".into());
        let uri = target_uri(&endpoint, "/users?limit=5").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:9000/v2/users");

        endpoint.path = None;
        let uri = target_uri(&endpoint, "/users?limit=5").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:9000/users?limit=5");
    }
}
