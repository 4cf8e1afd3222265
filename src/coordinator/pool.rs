//! Worker pool management.
//!
//! # Responsibilities
//! - Hold one handle per worker, fixed for the process lifetime
//! - Pick a worker uniformly at random for each request
//! - Send a routed request and wait for the reply with the same id

use std::sync::Arc;

use rand::Rng;
use tokio::process::Child;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::coordinator::pending::PendingReplies;
use crate::coordinator::CoordinatorError;
use crate::ipc::codec;
use crate::ipc::message::{reasons, ErrorCode, RoutedReply, RoutedRequest};

/// Coordinator-side handle to one worker.
#[derive(Debug)]
pub struct WorkerHandle {
    index: usize,
    outbound: mpsc::UnboundedSender<String>,
    pending: Arc<PendingReplies>,
    /// Child process in `process` mode; killed when the handle is dropped.
    process: Option<Child>,
}

impl WorkerHandle {
    pub(crate) fn new(
        index: usize,
        outbound: mpsc::UnboundedSender<String>,
        pending: Arc<PendingReplies>,
        process: Option<Child>,
    ) -> Self {
        Self {
            index,
            outbound,
            pending,
            process,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// OS process id, if this worker is a child process.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(Child::id)
    }

    /// Requests sent to this worker and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.pending.is_closed()
    }

    /// Send `request` to the worker and wait for its reply.
    ///
    /// There is no timeout: the future resolves when the worker answers or
    /// when its channel closes.
    pub async fn request(&self, request: &RoutedRequest) -> RoutedReply {
        let id = Uuid::new_v4();

        let line = match codec::encode(id, request) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(request_id = %id, error = %e, "Failed to encode routed request");
                return RoutedReply::error(ErrorCode::Internal, reasons::INVALID_REQUEST);
            }
        };

        let Some(reply) = self.pending.register(id) else {
            tracing::warn!(worker = self.index, request_id = %id, "Worker channel closed");
            return RoutedReply::worker_unavailable();
        };

        if self.outbound.send(line).is_err() {
            self.pending.cancel(id);
            tracing::warn!(worker = self.index, request_id = %id, "Worker channel closed");
            return RoutedReply::worker_unavailable();
        }

        tracing::trace!(worker = self.index, request_id = %id, url = %request.url, "Request sent to worker");

        reply.await.unwrap_or_else(|_| RoutedReply::worker_unavailable())
    }
}

/// Fixed-size set of workers. Never empty.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    pub fn new(workers: Vec<WorkerHandle>) -> Result<Self, CoordinatorError> {
        if workers.is_empty() {
            return Err(CoordinatorError::EmptyPool);
        }
        Ok(Self { workers })
    }

    /// Pick a worker uniformly at random.
    pub fn pick(&self) -> &WorkerHandle {
        &self.workers[random_index(self.workers.len())]
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.iter()
    }
}

/// Uniform index in `0..len`. `len` must be non-zero.
fn random_index(len: usize) -> usize {
    rand::thread_rng().gen_range(0..len)
}
