//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy and status handlers
//! - Wire up middleware (request ID, tracing)
//! - Hand each proxied request to the pipeline with its deadline
//! - Serve until the shutdown signal fires

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::broker::FileMessageBroker;
use crate::http::request::{proxy_request, request_id, PROXY_PREFIX};
use crate::http::response::{gateway_timeout, proxy_response, StatusReport};
use crate::lifecycle::ShutdownSignal;
use crate::messaging::MessageRegistry;
use crate::observability::metrics;
use crate::pipeline::RequestPipeline;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: RequestPipeline<FileMessageBroker>,
    pub registry: MessageRegistry,
    /// How long a request waits for its response.
    pub request_timeout: Duration,
    /// Pending requests are released when the server stops.
    pub shutdown: ShutdownSignal,
}

/// HTTP front end of the broker proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route(PROXY_PREFIX, any(proxy_handler))
            .route(&format!("{PROXY_PREFIX}/{{*path}}"), any(proxy_handler))
            .route("/status", get(status_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The router, for serving on a custom listener or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.cancelled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn proxy_handler(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let request = proxy_request(&method, &uri);
    let request_id = request_id(&headers).to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method,
        path = %request.path,
        "Proxying request"
    );

    // Shutdown is passed as the cancellation; the deadline is applied here so
    // an expired wait can be told apart from an aborted one.
    let handled = state.pipeline.handle(request, state.shutdown.clone().cancelled());
    let response = match tokio::time::timeout(state.request_timeout, handled).await {
        Ok(result) => {
            if let Err(e) = &result {
                tracing::warn!(request_id = %request_id, error = %e, "Proxy request failed");
            }
            proxy_response(result)
        }
        Err(_) => {
            tracing::warn!(
                request_id = %request_id,
                timeout = ?state.request_timeout,
                "No response before the request deadline"
            );
            gateway_timeout(state.request_timeout)
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "ok".to_string(),
        mode: state.pipeline.mode().to_string(),
        pending_responses: state.registry.pending_count(),
        in_flight_operations: state.pipeline.in_flight_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::ScratchDir;
    use crate::config::ApplicationConfig;
    use crate::http::request::X_REQUEST_ID;
    use crate::lifecycle::Shutdown;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_router(dir: &ScratchDir, shutdown: &Shutdown, timeout: Duration) -> (Router, Arc<FileMessageBroker>) {
        let broker = Arc::new(FileMessageBroker::start(&dir.config()).await.unwrap());
        let registry = MessageRegistry::new();
        let state = AppState {
            pipeline: RequestPipeline::new(
                &ApplicationConfig::default(),
                Duration::from_secs(60),
                broker.clone(),
                registry.clone(),
                shutdown.subscribe(),
            ),
            registry,
            request_timeout: timeout,
            shutdown: shutdown.subscribe(),
        };
        (HttpServer::new(state).router(), broker)
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_mode() {
        let dir = ScratchDir::new();
        let shutdown = Shutdown::new();
        let (router, _broker) = test_router(&dir, &shutdown, Duration::from_secs(1)).await;

        let response = router
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report: StatusReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.mode, "collapsing");
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unanswered_request_is_gateway_timeout() {
        let dir = ScratchDir::new();
        let shutdown = Shutdown::new();
        let (router, _broker) = test_router(&dir, &shutdown, Duration::from_millis(50)).await;

        let response = router
            .oneshot(Request::post("/api/proxy/orders").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let requests: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "req"))
            .collect();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_releases_request_as_client_closed() {
        let dir = ScratchDir::new();
        let shutdown = Shutdown::new();
        let (router, _broker) = test_router(&dir, &shutdown, Duration::from_secs(60)).await;

        let call = router.oneshot(Request::get("/api/proxy/pending").body(Body::empty()).unwrap());
        let trigger = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.trigger();
        };
        let (response, ()) = tokio::join!(call, trigger);

        assert_eq!(response.unwrap().status().as_u16(), 499);
    }
}
