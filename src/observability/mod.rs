//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! coordinator and workers produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → log aggregation (stderr of every process)
//!     → metrics endpoint (Prometheus scrape, coordinator only)
//! ```

pub mod logging;
pub mod metrics;
