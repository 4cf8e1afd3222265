//! Inbound request translation.
//!
//! # Responsibilities
//! - Describe an inbound request as a RoutedRequest for a worker
//!
//! # Design Decisions
//! - Headers are copied verbatim, repeated headers kept as lists
//! - The request body is never read

use axum::http::{HeaderMap, Uri};

use crate::ipc::message::{headers_from_map, RoutedRequest};

/// Build the worker message for an inbound request.
pub fn routed_request(uri: &Uri, headers: &HeaderMap) -> RoutedRequest {
    let url = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    RoutedRequest::new(headers_from_map(headers), url)
}
