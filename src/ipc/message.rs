//! Messages exchanged between the coordinator and its workers.
//!
//! Wire shapes (one JSON object per line, `id` added by [`Envelope`]):
//! ```text
//! coordinator → worker: { id, requestType: "HTTP", headers: {..}, body: null, url }
//! worker → coordinator: { id, data } | { id, error, errorCode }
//! ```

use std::collections::BTreeMap;

use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

/// Fixed tag identifying the kind of request being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "HTTP")]
    Http,
}

/// A header value as seen by the coordinator: single or repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

/// Header name (lowercase) to value(s).
pub type Headers = BTreeMap<String, HeaderValue>;

/// Convert an inbound header map, keeping repeated headers as lists.
pub fn headers_from_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for name in map.keys() {
        let mut values: Vec<String> = map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let value = if values.len() == 1 {
            HeaderValue::Single(values.remove(0))
        } else {
            HeaderValue::Multi(values)
        };
        headers.insert(name.as_str().to_string(), value);
    }
    headers
}

/// Description of one inbound HTTP request, routed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedRequest {
    pub request_type: RequestKind,
    pub headers: Headers,
    /// Request payload. Bodies are never read, so this is always `None`.
    #[serde(default)]
    pub body: Option<Vec<u8>>,
    /// Path and query of the inbound request.
    pub url: String,
}

impl RoutedRequest {
    pub fn new(headers: Headers, url: impl Into<String>) -> Self {
        Self {
            request_type: RequestKind::Http,
            headers,
            body: None,
            url: url.into(),
        }
    }
}

/// Status codes a worker may report instead of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No rule matched the request path.
    #[serde(rename = "404")]
    NotFound,
    /// Routing or coordination failed inside the proxy.
    #[serde(rename = "500")]
    Internal,
    /// The upstream could not be reached or answered garbage.
    #[serde(rename = "502")]
    BadGateway,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "404",
            Self::Internal => "500",
            Self::BadGateway => "502",
        }
    }
}

/// Reply bodies for the fixed failure cases.
pub mod reasons {
    pub const NO_RULE: &str = "No rule found";
    pub const NO_UPSTREAM: &str = "No upstream found";
    pub const UPSTREAM_FAILED: &str = "Upstream request failed";
    pub const INVALID_REQUEST: &str = "Invalid request";
    pub const INVALID_REPLY: &str = "Invalid worker reply";
    pub const WORKER_UNAVAILABLE: &str = "Worker unavailable";
}

/// A worker's answer to one [`RoutedRequest`].
///
/// Either the upstream body or an error with its code, never both and never
/// neither. The flat wire form is checked on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReplyFields", into = "ReplyFields")]
pub enum RoutedReply {
    Data(String),
    Error { code: ErrorCode, message: String },
}

impl RoutedReply {
    pub fn data(body: impl Into<String>) -> Self {
        Self::Data(body.into())
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::error(ErrorCode::NotFound, reasons::NO_RULE)
    }

    pub fn no_upstream() -> Self {
        Self::error(ErrorCode::Internal, reasons::NO_UPSTREAM)
    }

    pub fn upstream_failed() -> Self {
        Self::error(ErrorCode::BadGateway, reasons::UPSTREAM_FAILED)
    }

    pub fn worker_unavailable() -> Self {
        Self::error(ErrorCode::Internal, reasons::WORKER_UNAVAILABLE)
    }

    /// Status code the client should see.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Data(_) => StatusCode::OK,
            Self::Error { code, .. } => code.status(),
        }
    }

    /// Label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Data(_) => "200",
            Self::Error { code, .. } => code.as_str(),
        }
    }
}

/// Flat wire representation of [`RoutedReply`].
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
}

/// Why a flat reply is not a valid [`RoutedReply`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyShapeError {
    #[error("reply carries both data and an error")]
    Both,
    #[error("reply carries neither data nor an error")]
    Neither,
    #[error("reply error is missing its errorCode or message")]
    IncompleteError,
}

impl TryFrom<ReplyFields> for RoutedReply {
    type Error = ReplyShapeError;

    fn try_from(fields: ReplyFields) -> Result<Self, ReplyShapeError> {
        match (fields.data, fields.error, fields.error_code) {
            (Some(data), None, None) => Ok(RoutedReply::Data(data)),
            (None, Some(message), Some(code)) => Ok(RoutedReply::Error { code, message }),
            (Some(_), _, _) => Err(ReplyShapeError::Both),
            (None, None, None) => Err(ReplyShapeError::Neither),
            (None, _, _) => Err(ReplyShapeError::IncompleteError),
        }
    }
}

impl From<RoutedReply> for ReplyFields {
    fn from(reply: RoutedReply) -> Self {
        match reply {
            RoutedReply::Data(data) => ReplyFields {
                data: Some(data),
                ..Default::default()
            },
            RoutedReply::Error { code, message } => ReplyFields {
                error: Some(message),
                error_code: Some(code),
                ..Default::default()
            },
        }
    }
}
