//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check upstream ids are unique and addresses are usable
//! - Validate value ranges (worker count > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Rules pointing at unknown upstream ids are accepted; the worker answers
//!   them with 500 at request time

use std::collections::HashSet;

use crate::config::schema::{ProxyConfig, UpstreamUrlError};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rule #{index}: path must start with '/' (got {path:?})")]
    InvalidRulePath { index: usize, path: String },

    #[error("upstream #{index}: id must not be empty")]
    EmptyUpstreamId { index: usize },

    #[error("upstream id {id:?} is defined more than once")]
    DuplicateUpstreamId { id: String },

    #[error("upstream {id:?}: {source}")]
    InvalidUpstreamUrl {
        id: String,
        source: UpstreamUrlError,
    },

    #[error("server.workers must be at least 1")]
    ZeroWorkers,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.workers == Some(0) {
        errors.push(ValidationError::ZeroWorkers);
    }

    for (index, rule) in server.rules.iter().enumerate() {
        if !rule.path.starts_with('/') {
            errors.push(ValidationError::InvalidRulePath {
                index,
                path: rule.path.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for (index, upstream) in server.upstreams.iter().enumerate() {
        if upstream.id.is_empty() {
            errors.push(ValidationError::EmptyUpstreamId { index });
        } else if !seen.insert(upstream.id.as_str()) {
            errors.push(ValidationError::DuplicateUpstreamId {
                id: upstream.id.clone(),
            });
        }

        if let Err(source) = upstream.authority() {
            errors.push(ValidationError::InvalidUpstreamUrl {
                id: upstream.id.clone(),
                source,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Upstream ids referenced by a rule's first slot that no upstream defines.
///
/// Not an error: these requests are answered with 500 by the worker.
pub fn dangling_upstream_refs(config: &ProxyConfig) -> Vec<&str> {
    let known: HashSet<&str> = config
        .server
        .upstreams
        .iter()
        .map(|u| u.id.as_str())
        .collect();

    config
        .server
        .rules
        .iter()
        .filter_map(|rule| rule.upstreams.first())
        .map(String::as_str)
        .filter(|id| !known.contains(id))
        .collect()
}
