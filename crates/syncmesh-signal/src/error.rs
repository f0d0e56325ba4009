//! Error types for the signalling HTTP API.

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use syncmesh_common::api::ErrorResponse;
use thiserror::Error;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors a handler can answer with. Each maps to one HTTP status and a
/// `{"error": "..."}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request, rejected before touching the registry.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown or expired client, or unknown route.
    #[error("{0}")]
    NotFound(String),

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),

    /// Anything unexpected while serving one request.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Message returned for every 500, whatever the cause.
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Internal(e) => {
                error!("Handler execution failed: {:#}", e);
                SERVER_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
