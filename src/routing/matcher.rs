//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request URL against a rule's path prefix
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - The prefix is tested against the raw path-and-query string, so a
//!   prefix may include a query fragment
//! - No regex, no segment awareness: `/api` matches `/apiv2` too

/// Trait for matching request URLs against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the URL matches this condition.
    fn matches(&self, url: &str) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, url: &str) -> bool {
        url.starts_with(&self.prefix)
    }
}
