//! Coordinator ↔ worker messaging.
//!
//! # Data Flow
//! ```text
//! coordinator                              worker
//!     RoutedRequest ─ encode ─▶ line ─▶ decode_envelope ─▶ decode ─▶ handle
//!     pending[id] ◀─ decode ◀─ line ◀─ encode ◀─ RoutedReply
//! ```
//!
//! # Design Decisions
//! - JSON, one object per line, identical over pipes and in-memory duplexes
//! - Every message carries the request id; replies are matched by id only
//! - Payload validation happens after the id is known

pub mod codec;
pub mod message;

pub use codec::{CodecError, Envelope};
pub use message::{ErrorCode, HeaderValue, Headers, RequestKind, RoutedReply, RoutedRequest};
