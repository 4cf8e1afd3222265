//! Worker subsystem.
//!
//! # Data Flow
//! ```text
//! NDJSON line (stdin or in-memory duplex)
//!     → runtime.rs (decode envelope, one task per message)
//!     → Worker::handle
//!         → routing::Router (first matching rule, first upstream)
//!         → upstream.rs (GET, accumulate body)
//!     → RoutedReply tagged with the request id
//!     → runtime.rs (single writer) → NDJSON line
//! ```
//!
//! # Design Decisions
//! - The worker owns its configuration for its whole lifetime
//! - No state is kept between requests
//! - Routing misses are answered, transport failures are answered with 502

pub mod runtime;
pub mod upstream;

use crate::config::ProxyConfig;
use crate::ipc::{RoutedReply, RoutedRequest};
use crate::routing::{RouteError, Router};

pub use runtime::{config_from_env, run_process, serve, WorkerError, CONFIG_ENV};
pub use upstream::{ForwardError, Forwarder};

/// Routes requests and forwards them upstream.
pub struct Worker {
    router: Router,
    forwarder: Forwarder,
}

impl Worker {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            router: Router::from_config(&config.server),
            forwarder: Forwarder::new(),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one routed request and produce its reply.
    pub async fn handle(&self, request: &RoutedRequest) -> RoutedReply {
        let route = match self.router.route(&request.url) {
            Ok(route) => route,
            Err(RouteError::NoRule { url }) => {
                tracing::info!(url = %url, "No rule found");
                return RoutedReply::not_found();
            }
            Err(e @ RouteError::NoUpstream { .. }) => {
                tracing::warn!(url = %request.url, error = %e, "No upstream found");
                return RoutedReply::no_upstream();
            }
        };

        tracing::debug!(
            url = %request.url,
            rule = %route.rule.path(),
            upstream = %route.upstream.id,
            "Forwarding request"
        );

        match self.forwarder.get(route.upstream, &request.url).await {
            Ok(body) => RoutedReply::data(String::from_utf8_lossy(&body)),
            Err(e) => {
                tracing::error!(
                    url = %request.url,
                    upstream = %route.upstream.id,
                    error = %e,
                    "Upstream error"
                );
                RoutedReply::upstream_failed()
            }
        }
    }
}
