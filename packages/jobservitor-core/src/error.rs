use thiserror::Error;

/// Shared error taxonomy for the scheduler API and the executor worker.
///
/// Variants map directly onto the error taxonomy: validation, not-found,
/// conflict, store, and runtime errors. `jobservitor-api` translates these
/// into HTTP status codes; `jobservitor-executor` logs and continues.
#[derive(Error, Debug)]
pub enum JobservitorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("job not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("container runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, JobservitorError>;
