//! NDJSON framing for the worker channel.
//!
//! Every message is a single JSON object terminated by `\n`. The correlation
//! id sits next to the payload fields, so a worker can echo it back even when
//! it cannot make sense of the rest of the message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Errors on the worker channel.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("channel closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A payload tagged with the id of the request it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: Uuid,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(id: Uuid, payload: T) -> Self {
        Self { id, payload }
    }
}

impl Envelope<Value> {
    /// Decode the payload, keeping the id on failure so the peer can be told.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Envelope<T>, (Uuid, CodecError)> {
        let id = self.id;
        serde_json::from_value(self.payload)
            .map(|payload| Envelope { id, payload })
            .map_err(|e| (id, CodecError::Malformed(e)))
    }
}

/// Serialize an envelope into one line (without the trailing newline).
pub fn encode<T: Serialize>(id: Uuid, payload: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&Envelope::new(id, payload))?)
}

/// Parse a line far enough to read its id.
pub fn decode_envelope(line: &str) -> Result<Envelope<Value>, CodecError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Read the next non-blank line, `None` on EOF.
pub async fn next_line<R>(lines: &mut Lines<R>) -> Result<Option<String>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match lines.next_line().await? {
            Some(line) if line.trim().is_empty() => continue,
            other => return Ok(other),
        }
    }
}

/// Spawn a task that owns `writer` and writes every queued line to it.
///
/// Lines from concurrent producers are written whole, one at a time. The
/// task ends once every sender is dropped, or on the first write error.
pub fn spawn_writer<W>(mut writer: W) -> (mpsc::UnboundedSender<String>, JoinHandle<Result<(), CodecError>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        writer.shutdown().await.ok();
        Ok(())
    });
    (tx, handle)
}
