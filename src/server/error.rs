//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::VinoError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<VinoError> for ServerError {
    fn from(err: VinoError) -> Self {
        match err {
            VinoError::InvalidInput(msg) => ServerError::BadRequest(msg),
            e @ (VinoError::ShapeError { .. } | VinoError::InvalidParameter { .. }) => {
                ServerError::BadRequest(e.to_string())
            }
            e @ (VinoError::ArtifactMissing(_) | VinoError::ModelNotFitted) => {
                ServerError::Unavailable(e.to_string())
            }
            e => ServerError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
            ServerError::Io(e) => {
                tracing::error!(detail = %e, "IO error");
                (StatusCode::INTERNAL_SERVER_ERROR, "A file system error occurred".to_string())
            }
            ServerError::Json(_) => (StatusCode::BAD_REQUEST, "Invalid JSON format".to_string()),
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
