//! Worker message loop and process entry point.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};

use crate::config::{parse_config, ConfigError, ConfigFormat, ProxyConfig};
use crate::ipc::codec::{self, CodecError, Envelope};
use crate::ipc::message::{reasons, ErrorCode, RoutedReply, RoutedRequest};
use crate::observability::metrics;
use crate::worker::Worker;

/// Environment variable carrying the JSON configuration to worker processes.
pub const CONFIG_ENV: &str = "CLUSTER_PROXY_WORKER_CONFIG";

/// Errors that stop a worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("CLUSTER_PROXY_WORKER_CONFIG is not set")]
    MissingConfig,

    #[error("invalid worker configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("worker channel failed: {0}")]
    Channel(#[from] CodecError),
}

/// Serve routed requests read from `reader`, writing replies to `writer`.
///
/// Every message is handled on its own task, so slow upstreams do not hold
/// up other requests. Returns once `reader` reaches EOF and every in-flight
/// reply has been written.
pub async fn serve<R, W>(worker: Arc<Worker>, reader: R, writer: W) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (replies, writer_task) = codec::spawn_writer(writer);
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = codec::next_line(&mut lines).await? {
        tracing::trace!(message = %line, "Worker received message");

        let envelope = match codec::decode_envelope(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping message without a readable id");
                continue;
            }
        };

        let worker = Arc::clone(&worker);
        let replies = replies.clone();
        tokio::spawn(async move {
            let (id, reply) = match envelope.decode::<RoutedRequest>() {
                Ok(Envelope { id, payload }) => (id, worker.handle(&payload).await),
                Err((id, e)) => {
                    tracing::warn!(request_id = %id, error = %e, "Invalid routed request");
                    (id, RoutedReply::error(ErrorCode::Internal, reasons::INVALID_REQUEST))
                }
            };

            metrics::record_worker_reply(reply.outcome());

            match codec::encode(id, &reply) {
                Ok(line) => {
                    if replies.send(line).is_err() {
                        tracing::debug!(request_id = %id, "Reply channel closed, dropping reply");
                    }
                }
                Err(e) => tracing::error!(request_id = %id, error = %e, "Failed to encode reply"),
            }
        });
    }

    // In-flight tasks hold their own senders; the writer drains them.
    drop(replies);
    writer_task
        .await
        .map_err(|e| CodecError::Io(std::io::Error::other(e)))?
}

/// Configuration handed down by the coordinator through [`CONFIG_ENV`].
pub fn config_from_env() -> Result<ProxyConfig, WorkerError> {
    let raw = std::env::var(CONFIG_ENV).map_err(|_| WorkerError::MissingConfig)?;
    Ok(parse_config(&raw, ConfigFormat::Json)?)
}

/// Entry point of a worker process: messages over stdin/stdout.
pub async fn run_process(config: ProxyConfig) -> Result<(), WorkerError> {
    let worker = Arc::new(Worker::new(&config));

    tracing::info!(
        pid = std::process::id(),
        rules = worker.router().rule_count(),
        "Worker process is up"
    );

    serve(worker, tokio::io::stdin(), tokio::io::stdout()).await?;

    tracing::info!(pid = std::process::id(), "Worker input closed, exiting");
    Ok(())
}
