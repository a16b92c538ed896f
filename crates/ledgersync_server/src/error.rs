//! Error types for the ledger server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledgersync_protocol::{ErrorResponse, ValidationError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the ledger server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed or invalid request body.
    #[error("invalid data: {0}")]
    InvalidRequest(String),

    /// A record failed validation.
    #[error("invalid data: {0}")]
    Validation(#[from] ValidationError),

    /// Target row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_) | ServerError::Validation(_) | ServerError::NotFound(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Internal(_))
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON error body for this error.
    pub fn body(&self) -> ErrorResponse {
        ErrorResponse::new(self.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status(), axum::Json(self.body())).into_response()
    }
}
