//! Response construction from worker replies.
//!
//! # Design Decisions
//! - Data replies are relayed as 200 with the upstream body untouched
//! - Error replies use their code as status and their message as body

use axum::response::{IntoResponse, Response};

use crate::ipc::RoutedReply;

impl IntoResponse for RoutedReply {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            RoutedReply::Data(body) => (status, body).into_response(),
            RoutedReply::Error { message, .. } => (status, message).into_response(),
        }
    }
}
