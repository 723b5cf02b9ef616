//! Error types for the learning engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RermError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("Matrix is not positive definite (pivot {0})")]
    NotPositiveDefinite(usize),

    #[error("Numerical failure: {0}")]
    NumericalFailure(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RermError {
    fn from(err: serde_json::Error) -> Self {
        RermError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RermError>;
