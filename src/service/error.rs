use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to parse stylesheet: {0}")]
    Parse(String),

    #[error("Failed to compute {operation}: {reason}")]
    Query {
        operation: &'static str,
        reason: String,
    },

    #[error("Invalid document uri: {0}")]
    InvalidUri(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
