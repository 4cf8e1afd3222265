//! Worker creation.
//!
//! Both modes produce the same thing: a byte channel speaking NDJSON, with a
//! writer task feeding requests in and a reader task routing replies to their
//! pending slots.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};

use crate::config::ProxyConfig;
use crate::coordinator::pending::PendingReplies;
use crate::coordinator::pool::WorkerHandle;
use crate::coordinator::CoordinatorError;
use crate::ipc::codec;
use crate::ipc::message::{reasons, ErrorCode, RoutedReply};
use crate::worker::{self, Worker, CONFIG_ENV};

/// Subcommand the proxy binary runs to become a worker.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Size of the in-memory pipe used by task workers.
const TASK_CHANNEL_BYTES: usize = 64 * 1024;

/// How workers are run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMode {
    /// Child processes of `program`, run as `program worker`.
    Process { program: PathBuf },
    /// Tokio tasks inside the coordinator process.
    Task,
}

impl WorkerMode {
    /// Child processes of the running executable.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::Process {
            program: std::env::current_exe()?,
        })
    }
}

/// Start worker number `index` and connect it to the coordinator.
pub fn spawn_worker(
    index: usize,
    mode: &WorkerMode,
    config: &ProxyConfig,
) -> Result<WorkerHandle, CoordinatorError> {
    match mode {
        WorkerMode::Process { program } => spawn_process(index, program, config),
        WorkerMode::Task => Ok(spawn_task(index, config)),
    }
}

fn spawn_process(
    index: usize,
    program: &Path,
    config: &ProxyConfig,
) -> Result<WorkerHandle, CoordinatorError> {
    let config_json = serde_json::to_string(config)?;

    let mut child = Command::new(program)
        .arg(WORKER_SUBCOMMAND)
        .env(CONFIG_ENV, config_json)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CoordinatorError::Spawn { index, source })?;

    let stdin = child
        .stdin
        .take()
        .ok_or(CoordinatorError::MissingPipe { index, pipe: "stdin" })?;
    let stdout = child
        .stdout
        .take()
        .ok_or(CoordinatorError::MissingPipe { index, pipe: "stdout" })?;

    tracing::info!(worker = index, pid = ?child.id(), "Worker process spawned");
    Ok(attach(index, stdout, stdin, Some(child)))
}

fn spawn_task(index: usize, config: &ProxyConfig) -> WorkerHandle {
    let (coordinator_end, worker_end) = tokio::io::duplex(TASK_CHANNEL_BYTES);
    let (worker_read, worker_write) = tokio::io::split(worker_end);
    let worker = Arc::new(Worker::new(config));

    tokio::spawn(async move {
        if let Err(e) = worker::serve(worker, worker_read, worker_write).await {
            tracing::error!(worker = index, error = %e, "Worker task failed");
        }
        tracing::debug!(worker = index, "Worker task finished");
    });

    tracing::info!(worker = index, "Worker task spawned");
    let (reader, writer) = tokio::io::split(coordinator_end);
    attach(index, reader, writer, None)
}

fn attach<R, W>(index: usize, reader: R, writer: W, process: Option<Child>) -> WorkerHandle
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, writer_task) = codec::spawn_writer(writer);
    tokio::spawn(async move {
        match writer_task.await {
            Ok(Err(e)) => tracing::warn!(worker = index, error = %e, "Worker channel write failed"),
            Err(e) => tracing::warn!(worker = index, error = %e, "Worker channel writer panicked"),
            Ok(Ok(())) => {}
        }
    });

    let pending = Arc::new(PendingReplies::new());
    tokio::spawn(read_replies(index, reader, Arc::clone(&pending)));

    WorkerHandle::new(index, outbound, pending, process)
}

/// Deliver replies from one worker until its channel closes.
async fn read_replies<R>(index: usize, reader: R, pending: Arc<PendingReplies>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match codec::next_line(&mut lines).await {
            Ok(Some(line)) => deliver(index, &pending, &line),
            Ok(None) => {
                tracing::warn!(worker = index, "Worker channel closed");
                break;
            }
            Err(e) => {
                tracing::error!(worker = index, error = %e, "Worker channel read failed");
                break;
            }
        }
    }

    let failed = pending.close();
    if failed > 0 {
        tracing::warn!(worker = index, failed, "Pending requests failed after worker exit");
    }
}

fn deliver(index: usize, pending: &PendingReplies, line: &str) {
    let envelope = match codec::decode_envelope(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(worker = index, error = %e, "Dropping worker message without a readable id");
            return;
        }
    };

    let (id, reply) = match envelope.decode::<RoutedReply>() {
        Ok(envelope) => (envelope.id, envelope.payload),
        Err((id, e)) => {
            tracing::warn!(worker = index, request_id = %id, error = %e, "Invalid worker reply");
            (id, RoutedReply::error(ErrorCode::Internal, reasons::INVALID_REPLY))
        }
    };

    if !pending.complete(id, reply) {
        tracing::debug!(worker = index, request_id = %id, "Reply for a request no longer waiting");
    }
}
