//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits so the same structure can be read from a
//! config file and handed to worker processes as JSON.

use std::str::FromStr;

use axum::http::uri::Authority;
use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ProxyConfig {
    /// Listener, worker pool and routing table.
    pub server: ServerConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server section: where to listen and how to route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// TCP port for the public HTTP listener.
    #[serde(default = "default_listen")]
    pub listen: u16,

    /// Number of workers. Falls back to the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Routing rules, evaluated in order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Upstream definitions referenced by rules.
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: None,
            rules: Vec::new(),
            upstreams: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Resolve the worker count, defaulting to the number of available cores.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

fn default_listen() -> u16 {
    8080
}

/// Path-prefix rule mapping requests to an ordered list of upstream ids.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleConfig {
    /// Path prefix to match (case-sensitive).
    pub path: String,

    /// Upstream ids. Only the first one is used for forwarding.
    pub upstreams: Vec<String>,
}

/// Named upstream service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UpstreamConfig {
    /// Unique upstream identifier.
    pub id: String,

    /// Upstream host with optional port (e.g. "localhost:9000").
    pub url: String,
}

impl UpstreamConfig {
    /// Parse `url` into the authority requests are forwarded to.
    ///
    /// Accepts `host`, `host:port` and `http://host[:port][/]`.
    pub fn authority(&self) -> Result<Authority, UpstreamUrlError> {
        let raw = self.url.trim();
        if raw.starts_with("https://") {
            return Err(UpstreamUrlError::Tls(raw.to_string()));
        }
        let host = raw.strip_prefix("http://").unwrap_or(raw);
        let host = host.strip_suffix('/').unwrap_or(host);
        if host.is_empty() || host.contains('/') {
            return Err(UpstreamUrlError::Invalid(raw.to_string()));
        }
        Authority::from_str(host).map_err(|_| UpstreamUrlError::Invalid(raw.to_string()))
    }
}

/// Reasons an upstream `url` cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamUrlError {
    #[error("TLS upstreams are not supported: {0}")]
    Tls(String),

    #[error("invalid upstream address: {0:?}")]
    Invalid(String),
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
