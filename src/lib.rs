//! Multi-worker reverse proxy library.

pub mod config;
pub mod coordinator;
pub mod http;
pub mod ipc;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod worker;

pub use config::schema::ProxyConfig;
pub use coordinator::{Coordinator, CoordinatorOptions, WorkerMode};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
