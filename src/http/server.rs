//! HTTP server setup and the inbound gateway handler.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all gateway handler
//! - Wire up middleware (request timeout, request ID, tracing)
//! - Buffer the inbound body and hand the request to the routing engine
//! - Map routing errors to caller-visible responses

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response, StatusCode},
    response::IntoResponse,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::routing::{RoutingEngine, RoutingError};
use crate::store::model::HttpMethod;
use crate::store::RuleStore;
use crate::upstream::{CallError, CallRequest, EndpointCaller};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RoutingEngine>,
    pub max_body_bytes: usize,
}

/// Inbound HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Build the server around a rule store. The store is behind the
    /// `RuleStore` trait so tests and alternative backends plug in here.
    pub fn new(config: GatewayConfig, store: Arc<dyn RuleStore>) -> Self {
        let caller = Arc::new(EndpointCaller::new(&config.upstream));
        let engine = Arc::new(RoutingEngine::new(store, caller));
        let state = AppState {
            engine,
            max_body_bytes: config.upstream.max_body_bytes,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway listening");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("shutdown signal received");
            })
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Catch-all handler: every inbound request goes through the routing
/// engine.
async fn gateway_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> axum::response::Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Some(method) = HttpMethod::from_wire(request.method()) else {
        return (StatusCode::METHOD_NOT_ALLOWED, "Unsupported method").into_response();
    };

    let path = request.uri().path().to_string();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let call = CallRequest {
        path: path_and_query,
        headers: parts.headers,
        body,
    };

    match state.engine.route(method, &path, call, &request_id).await {
        Ok(routed) => {
            let mut response = Response::new(Body::from(routed.body));
            *response.status_mut() = routed.status;
            *response.headers_mut() = routed.headers;
            response
        }
        Err(error) => error_response(error, &request_id, &path),
    }
}

/// Map a routing failure to its single caller-visible outcome. Backend
/// error bodies pass through untouched; other failures get a terse text
/// body.
fn error_response(error: RoutingError, request_id: &str, path: &str) -> axum::response::Response {
    let status = error.status();

    match error {
        RoutingError::NoMatchingRule => {
            (status, "No matching rule").into_response()
        }
        RoutingError::Call(CallError::BackendError { body, .. }) => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response
        }
        error => {
            tracing::warn!(
                request_id = %request_id,
                path,
                error = %error,
                status = status.as_u16(),
                "request failed"
            );
            (status, format!("{error}")).into_response()
        }
    }
}
