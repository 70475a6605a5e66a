use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobservitor_core::JobservitorError;
use serde::Serialize;
use thiserror::Error;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Translates the shared error taxonomy into HTTP responses. Grounded in
/// the `AuthError`-style `thiserror` enum used elsewhere in the codebase,
/// with the status-code mapping spec'd in the error handling design:
/// validation -> 422, not found -> 404, conflict -> 400, store/runtime
/// errors -> 500.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("job not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(JobservitorError),
}

impl From<JobservitorError> for ApiError {
    fn from(err: JobservitorError) -> Self {
        match err {
            JobservitorError::Validation(msg) => ApiError::Validation(msg),
            JobservitorError::NotFound => ApiError::NotFound,
            JobservitorError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
