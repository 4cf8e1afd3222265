//! HTTP server setup.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all handler
//! - Wire up middleware (request id, tracing)
//! - Bind server to listener, stop on shutdown signal
//! - Hand every request to the coordinator and relay its reply

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Extension, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::coordinator::Coordinator;
use crate::http::request::routed_request;
use crate::ipc::RoutedReply;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

/// Public HTTP listener of the coordinator.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        let state = AppState { coordinator };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        with_middleware(
            Router::new()
                .route("/", any(proxy_handler))
                .route("/{*path}", any(proxy_handler))
                .with_state(state),
        )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Server is up");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Headers as the client sent them, before the request-id layer adds one.
#[derive(Debug, Clone)]
pub struct InboundHeaders(pub HeaderMap);

async fn capture_inbound_headers(mut request: Request, next: Next) -> Response {
    let headers = request.headers().clone();
    request.extensions_mut().insert(InboundHeaders(headers));
    next.run(request).await
}

fn with_middleware(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(capture_inbound_headers))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

/// Dispatch the request to a worker and relay the reply.
async fn proxy_handler(
    State(state): State<AppState>,
    Extension(InboundHeaders(inbound)): Extension<InboundHeaders>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let request = routed_request(&uri, &inbound);

    tracing::debug!(request_id = %request_id, method = %method, url = %request.url, "Proxying request");

    let reply = state.coordinator.dispatch(request).await;
    metrics::record_request(method.as_str(), reply.outcome(), start);
    if let RoutedReply::Error { code, message } = &reply {
        tracing::debug!(request_id = %request_id, code = code.as_str(), reason = %message, "Worker answered with an error");
    }

    reply.into_response()
}
