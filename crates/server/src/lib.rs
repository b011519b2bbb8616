//! HTTP and WebSocket server for the sales chat agent
//!
//! Exposes the conversation engine over a WebSocket endpoint plus a small
//! REST surface for session inspection and transcript reads.

pub mod http;
pub mod session;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use session::{Session, SessionRegistry};
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        use axum::http::StatusCode;
        match err {
            ServerError::Session(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::WebSocket(_)
            | ServerError::Persistence(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
