//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RoutedRequest.url
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (path prefix test)
//!     → first upstream id of the matched rule
//!     → Return: Route, NoRule or NoUpstream
//!
//! Compilation (at worker startup):
//!     RuleConfig[] + UpstreamConfig[]
//!     → keep rule order as configured
//!     → index upstreams by id
//!     → freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled once per worker, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same rule
//! - First match wins (configuration order, no priorities)

pub mod matcher;
pub mod router;

pub use router::{Route, RouteError, Router, Upstream};
