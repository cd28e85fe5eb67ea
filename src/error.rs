//! Error types for superpixel explanations

use thiserror::Error;

/// Result type alias for explanation operations
pub type Result<T> = std::result::Result<T, LimeError>;

/// Error returned by an external classifier
pub type ClassifierError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the explanation pipeline
#[derive(Error, Debug)]
pub enum LimeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Predictor error: {message}")]
    PredictorError {
        message: String,
        #[source]
        source: Option<ClassifierError>,
    },

    #[error("Singular fit: {0}")]
    SingularFit(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl LimeError {
    /// Build an `InvalidParameter` error
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        LimeError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Build a `PredictorError` without an underlying classifier error
    pub fn predictor(message: impl Into<String>) -> Self {
        LimeError::PredictorError {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error was raised by argument or shape validation
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            LimeError::InvalidArgument(_)
                | LimeError::InvalidParameter { .. }
                | LimeError::ShapeError { .. }
        )
    }
}

impl From<serde_json::Error> for LimeError {
    fn from(err: serde_json::Error) -> Self {
        LimeError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LimeError {
    fn from(err: ndarray::ShapeError) -> Self {
        LimeError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
