//! Rule lookup and upstream resolution.
//!
//! # Responsibilities
//! - Store compiled rules in configuration order
//! - Find the first rule whose prefix matches a URL
//! - Resolve the rule's first upstream id to an address
//!
//! # Design Decisions
//! - Immutable after construction (shared across tasks without locks)
//! - O(n) prefix scan; first match wins, not longest match
//! - Only the first listed upstream is ever used; there is no failover
//! - Explicit errors for no-rule and no-upstream rather than silent defaults

use std::collections::HashMap;

use axum::http::uri::Authority;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::routing::matcher::{Matcher, PathPrefixMatcher};

/// A rule compiled for lookup.
#[derive(Debug)]
pub struct CompiledRule {
    matcher: PathPrefixMatcher,
    upstreams: Vec<String>,
}

impl CompiledRule {
    pub fn path(&self) -> &str {
        self.matcher.prefix()
    }

    /// The upstream id requests matching this rule are sent to.
    pub fn primary_upstream(&self) -> Option<&str> {
        self.upstreams.first().map(String::as_str)
    }
}

/// An upstream ready to receive forwarded requests.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub id: String,
    pub authority: Authority,
}

/// The outcome of a successful lookup.
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub rule: &'a CompiledRule,
    pub upstream: &'a Upstream,
}

/// Why a URL could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no rule matches {url}")]
    NoRule { url: String },

    #[error("rule {path} points at unknown upstream {id:?}")]
    NoUpstream { path: String, id: Option<String> },
}

/// Immutable routing table.
#[derive(Debug, Default)]
pub struct Router {
    rules: Vec<CompiledRule>,
    upstreams: HashMap<String, Upstream>,
}

impl Router {
    /// Build the table from the server section of a validated configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .map(|rule| CompiledRule {
                matcher: PathPrefixMatcher::new(rule.path.clone()),
                upstreams: rule.upstreams.clone(),
            })
            .collect();

        let mut upstreams = HashMap::new();
        for upstream in config.upstreams.iter().filter_map(Self::compile_upstream) {
            // Earlier definitions shadow later ones with the same id.
            upstreams.entry(upstream.id.clone()).or_insert(upstream);
        }

        Self { rules, upstreams }
    }

    fn compile_upstream(config: &UpstreamConfig) -> Option<Upstream> {
        match config.authority() {
            Ok(authority) => Some(Upstream {
                id: config.id.clone(),
                authority,
            }),
            Err(e) => {
                tracing::warn!(upstream = %config.id, error = %e, "Skipping unusable upstream");
                None
            }
        }
    }

    /// First rule, in configuration order, whose prefix matches `url`.
    pub fn match_rule(&self, url: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| rule.matcher.matches(url))
    }

    pub fn upstream(&self, id: &str) -> Option<&Upstream> {
        self.upstreams.get(id)
    }

    /// Match a rule and resolve its first upstream.
    pub fn route(&self, url: &str) -> Result<Route<'_>, RouteError> {
        let rule = self.match_rule(url).ok_or_else(|| RouteError::NoRule {
            url: url.to_string(),
        })?;

        let upstream = rule
            .primary_upstream()
            .and_then(|id| self.upstream(id))
            .ok_or_else(|| RouteError::NoUpstream {
                path: rule.path().to_string(),
                id: rule.primary_upstream().map(str::to_string),
            })?;

        Ok(Route { rule, upstream })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;

    fn server(rules: &[(&str, &[&str])], upstreams: &[(&str, &str)]) -> ServerConfig {
        ServerConfig {
            rules: rules
                .iter()
                .map(|(path, ids)| RuleConfig {
                    path: path.to_string(),
                    upstreams: ids.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
            upstreams: upstreams
                .iter()
                .map(|(id, url)| UpstreamConfig {
                    id: id.to_string(),
                    url: url.to_string(),
                })
                .collect(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn first_listed_rule_wins_over_longer_prefix() {
        let router = Router::from_config(&server(
            &[("/api", &["short"]), ("/api/users", &["long"])],
            &[("short", "localhost:9000"), ("long", "localhost:9001")],
        ));

        let route = router.route("/api/users/7").unwrap();
        assert_eq!(route.rule.path(), "/api");
        assert_eq!(route.upstream.id, "short");
    }

    #[test]
    fn later_rule_used_when_earlier_does_not_match() {
        let router = Router::from_config(&server(
            &[("/images", &["a"]), ("/", &["b"])],
            &[("a", "localhost:9000"), ("b", "localhost:9001")],
        ));

        assert_eq!(router.route("/docs").unwrap().upstream.id, "b");
        assert_eq!(router.route("/images/x.png").unwrap().upstream.id, "a");
    }

    #[test]
    fn no_rule_is_reported() {
        let router = Router::from_config(&server(&[("/api", &["u1"])], &[("u1", "localhost:9000")]));
        assert_eq!(
            router.route("/other").unwrap_err(),
            RouteError::NoRule {
                url: "/other".into()
            }
        );
    }

    #[test]
    fn only_first_upstream_is_considered() {
        let router = Router::from_config(&server(
            &[("/api", &["missing", "u1"])],
            &[("u1", "localhost:9000")],
        ));
        assert_eq!(
            router.route("/api/foo").unwrap_err(),
            RouteError::NoUpstream {
                path: "/api".into(),
                id: Some("missing".into())
            }
        );
    }

    #[test]
    fn rule_without_upstreams_has_no_upstream() {
        let router = Router::from_config(&server(&[("/api", &[])], &[("u1", "localhost:9000")]));
        assert!(matches!(
            router.route("/api").unwrap_err(),
            RouteError::NoUpstream { id: None, .. }
        ));
    }

    #[test]
    fn resolved_upstream_carries_authority() {
        let router = Router::from_config(&server(
            &[("/", &["u1"])],
            &[("u1", "http://localhost:9000")],
        ));
        assert_eq!(router.route("/").unwrap().upstream.authority, "localhost:9000");
        assert_eq!(router.rule_count(), 1);
    }

    #[test]
    fn duplicate_upstream_id_resolves_to_first_definition() {
        let router = Router::from_config(&server(
            &[("/", &["u1"])],
            &[("u1", "localhost:9000"), ("u1", "localhost:9001")],
        ));
        assert_eq!(router.route("/").unwrap().upstream.authority, "localhost:9000");
    }
}
