//! Request failures and their JSON error envelope.

use axum::http::StatusCode as HttpStatus;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

use chorus_protocol::ErrorResponse;

use crate::native::StatusCode;

/// Every failure a request can end in.
///
/// The `Display` text is what the client sees in the error envelope. Native
/// status codes and internal details are logged but never sent back.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Requested JSON is broken")]
    BrokenBody(String),

    #[error("Requested JSON is invalid: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Query parameter '{0}' is missing")]
    MissingParameter(&'static str),

    #[error("Query parameter '{name}' {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Command {position} is invalid: {reason}")]
    InvalidCommand { position: usize, reason: String },

    #[error("Command {position} cannot be encoded: {reason}")]
    Encoding { position: usize, reason: String },

    #[error("Failed to call {operation}")]
    Native { operation: String, code: StatusCode },

    #[error("404 Not found")]
    NotFound,

    #[error("Internal error")]
    Internal(String),
}

impl ApiError {
    pub fn native(operation: impl Into<String>, code: StatusCode) -> Self {
        ApiError::Native {
            operation: operation.into(),
            code,
        }
    }

    pub fn status(&self) -> HttpStatus {
        match self {
            ApiError::NotFound => HttpStatus::NOT_FOUND,
            _ => HttpStatus::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Native { operation, code } => {
                error!(operation = %operation, code = code.0, "Native call failed");
            }
            ApiError::Internal(detail) => error!("Internal error: {}", detail),
            ApiError::BrokenBody(detail) => warn!("Failed to read request body: {}", detail),
            ApiError::NotFound => {}
            other => warn!("Rejected request: {}", other),
        }

        let body = ErrorResponse {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
