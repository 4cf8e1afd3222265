//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all handler)
//!     → request.rs (headers + path/query → RoutedRequest)
//!     → coordinator (worker round trip)
//!     → response.rs (RoutedReply → status + body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use server::HttpServer;
