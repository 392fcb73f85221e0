use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scriptgate_core::{ExecutionError, ResolveError};
use tracing::error;

/// Failures surfaced before a response starts streaming.
#[derive(Debug)]
pub enum ApiError {
    MissingScriptName,
    ScriptNotFound,
    Busy(usize),
    Internal(String),
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::EmptyName => Self::MissingScriptName,
            ResolveError::InvalidName(_) | ResolveError::NotFound(_) => Self::ScriptNotFound,
        }
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Busy(limit) => Self::Busy(limit),
            other => {
                error!(error = %other, "Error occurred");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingScriptName => {
                (StatusCode::BAD_REQUEST, "Error: No script name provided").into_response()
            }
            Self::ScriptNotFound => (StatusCode::NOT_FOUND, "Error: Script not found").into_response(),
            Self::Busy(limit) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Error: Too many concurrent executions (limit {})", limit),
            )
                .into_response(),
            Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", message)).into_response()
            }
        }
    }
}
