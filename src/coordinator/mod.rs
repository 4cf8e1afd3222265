//! Coordinator subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ProxyConfig + worker count
//!     → spawn.rs (child processes or tasks, one NDJSON channel each)
//!     → pool.rs (fixed WorkerPool, never empty)
//!
//! Per request:
//!     RoutedRequest
//!     → pool.rs (uniform random worker)
//!     → pending.rs (slot keyed by a fresh request id)
//!     → worker channel ... reply line
//!     → spawn.rs reader task (decode, validate, complete slot)
//!     → RoutedReply
//! ```
//!
//! # Design Decisions
//! - Replies are correlated by id, so concurrent requests on one worker
//!   cannot receive each other's replies
//! - The pool is never resized; a dead worker answers "Worker unavailable"
//! - No timeouts or cancellation on the worker hop

pub mod pending;
pub mod pool;
pub mod spawn;

use crate::config::ProxyConfig;
use crate::ipc::{RoutedReply, RoutedRequest};

pub use pending::PendingReplies;
pub use pool::{WorkerHandle, WorkerPool};
pub use spawn::{WorkerMode, WORKER_SUBCOMMAND};

/// Errors while starting the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("worker pool must contain at least one worker")]
    EmptyPool,

    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        source: std::io::Error,
    },

    #[error("worker {index} has no {pipe} pipe")]
    MissingPipe { index: usize, pipe: &'static str },

    #[error("failed to serialize worker configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub worker_count: usize,
    pub mode: WorkerMode,
}

/// Owns the worker pool and dispatches requests to it.
#[derive(Debug)]
pub struct Coordinator {
    pool: WorkerPool,
}

impl Coordinator {
    /// Spawn `worker_count` workers, each given the full configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(options: &CoordinatorOptions, config: &ProxyConfig) -> Result<Self, CoordinatorError> {
        if options.worker_count == 0 {
            return Err(CoordinatorError::EmptyPool);
        }

        let workers = (0..options.worker_count)
            .map(|index| spawn::spawn_worker(index, &options.mode, config))
            .collect::<Result<Vec<_>, _>>()?;
        let pool = WorkerPool::new(workers)?;

        tracing::info!(
            workers = pool.len(),
            mode = ?options.mode,
            "Worker pool is up"
        );

        Ok(Self { pool })
    }

    /// Route one request through a randomly chosen worker.
    pub async fn dispatch(&self, request: RoutedRequest) -> RoutedReply {
        let worker = self.pool.pick();
        tracing::debug!(worker = worker.index(), url = %request.url, "Dispatching request");
        worker.request(&request).await
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}
