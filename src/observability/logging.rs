//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for coordinator and worker processes
//! - Configure log level from config, overridable via `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Output goes to stderr: a worker's stdout is its reply channel

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(level: &str) -> String {
    format!("cluster_proxy={level},tower_http={level}")
}

/// Install the global subscriber. Call once per process.
pub fn init(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_crate_and_http_layer() {
        assert_eq!(default_filter("debug"), "cluster_proxy=debug,tower_http=debug");
    }
}
