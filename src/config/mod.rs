//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → coordinator: listener port, worker count
//!     → every worker: serialized copy, routing table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - Optional fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{ObservabilityConfig, ProxyConfig, RuleConfig, ServerConfig, UpstreamConfig};
pub use validation::ValidationError;
