//! Error types for the Forja framework.
//!
//! This module defines the error types used throughout the Forja ecosystem,
//! covering configuration validation, expression parsing and evaluation,
//! and persistence of mining results.

use thiserror::Error;

/// The main error type for Forja operations.
///
/// Configuration errors are surfaced before a mining run starts. Errors raised
/// while evaluating a single candidate are absorbed by the fitness layer and
/// never abort a generation.
#[derive(Debug, Error)]
pub enum ForjaError {
    /// Invalid configuration value or combination of values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error when a required column is missing from the panel.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// An expression referenced a column that is not part of the panel.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// An expression referenced an operator that is not registered.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// An operator received the wrong number of arguments.
    #[error("Operator {name} expects {expected} arguments, got {actual}")]
    Arity {
        /// Operator name.
        name: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// A composition was rejected by the dimension tracker.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Two matrices that must share a shape do not.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when data is insufficient for the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Expression text could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Numeric evaluation of an expression failed.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl From<String> for ForjaError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for ForjaError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for Forja operations.
///
/// This is a convenience type that uses [`ForjaError`] as the error type.
pub type Result<T> = std::result::Result<T, ForjaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForjaError::Evaluation("all values are NaN".to_string());
        assert_eq!(err.to_string(), "Evaluation failed: all values are NaN");

        let err = ForjaError::MissingColumn("Close".to_string());
        assert_eq!(err.to_string(), "Missing required column: Close");

        let err = ForjaError::Arity {
            name: "ts_mean".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Operator ts_mean expects 2 arguments, got 1");
    }

    #[test]
    fn test_error_from_string() {
        let err: ForjaError = "boom".into();
        assert!(matches!(err, ForjaError::Other(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ForjaError = io.into();
        assert!(matches!(err, ForjaError::Io(_)));
    }
}
