//! Upstream forwarding.
//!
//! # Responsibilities
//! - Issue one plain HTTP GET per routed request
//! - Accumulate the full response body
//!
//! # Design Decisions
//! - GET only, regardless of the inbound method; no request body, no headers
//! - The upstream status is not inspected; whatever body comes back is data
//! - No retries, no timeouts: a silent upstream leaves the request pending
//! - No connection reuse between forwards

use axum::body::{Body, Bytes};
use axum::http::uri::Scheme;
use axum::http::{Method, Request, Uri};
use hyper::body::Incoming;
use hyper::Response;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::routing::Upstream;

/// Errors while talking to an upstream.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream body read failed: {0}")]
    Body(#[source] axum::Error),
}

/// HTTP client used by a worker to reach upstreams.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new() -> Self {
        // One connection per forward; nothing is kept alive between requests.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());
        Self { client }
    }

    /// GET `url` (path and query) from `upstream` and return the whole body.
    pub async fn get(&self, upstream: &Upstream, url: &str) -> Result<Bytes, ForwardError> {
        let uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(upstream.authority.clone())
            .path_and_query(url)
            .build()?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())?;

        let response: Response<Incoming> = self.client.request(request).await?;

        tracing::debug!(
            upstream = %upstream.id,
            status = %response.status(),
            "Upstream responded"
        );

        axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
            .await
            .map_err(ForwardError::Body)
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}
