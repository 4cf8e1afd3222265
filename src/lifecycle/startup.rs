//! Startup orchestration.
//!
//! # Order
//! 1. Spawn the worker pool (fatal if it cannot be filled)
//! 2. Bind the public listener
//! 3. Serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::coordinator::{Coordinator, CoordinatorError, CoordinatorOptions, WorkerMode};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;

/// Fatal startup and serving errors.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to start workers: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Everything needed to bring the proxy up.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config: ProxyConfig,
    pub addr: SocketAddr,
    pub worker_count: usize,
    pub mode: WorkerMode,
}

impl StartupOptions {
    /// Listen on all interfaces at the configured port.
    pub fn from_config(config: ProxyConfig, mode: WorkerMode) -> Self {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.listen));
        let worker_count = config.server.worker_count();
        Self {
            config,
            addr,
            worker_count,
            mode,
        }
    }
}

/// Start workers, bind the listener and serve until `shutdown` fires.
pub async fn run(options: StartupOptions, shutdown: &Shutdown) -> Result<(), StartupError> {
    let coordinator = Coordinator::start(
        &CoordinatorOptions {
            worker_count: options.worker_count,
            mode: options.mode,
        },
        &options.config,
    )?;

    let listener = TcpListener::bind(options.addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: options.addr,
            source,
        })?;

    HttpServer::new(Arc::new(coordinator))
        .run(listener, shutdown.subscribe())
        .await?;
    Ok(())
}
