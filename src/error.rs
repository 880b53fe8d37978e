//! Error types for the wine-quality pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, VinoError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum VinoError {
    #[error("Dataset unavailable: {0}")]
    DataUnavailable(String),

    #[error("Quality bin {bin} has {count} member(s); at least 2 are required to stratify")]
    InsufficientStratumSize { bin: usize, count: usize },

    #[error("Search space is empty: {0}")]
    SearchSpaceEmpty(String),

    #[error("R² is undefined: test targets have zero variance and predictions are not exact")]
    UndefinedR2,

    #[error("Failed to write {artifact} artifact: {reason}")]
    WriteFailure { artifact: String, reason: String },

    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl VinoError {
    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        VinoError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for VinoError {
    fn from(err: polars::error::PolarsError) -> Self {
        VinoError::DataUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for VinoError {
    fn from(err: serde_json::Error) -> Self {
        VinoError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for VinoError {
    fn from(err: bincode::Error) -> Self {
        VinoError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for VinoError {
    fn from(err: ndarray::ShapeError) -> Self {
        VinoError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
