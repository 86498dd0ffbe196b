//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared helpers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Code cannot be empty")]
    EmptyCode,

    #[error("Given code '{0}' contains illegal characters (allowed: A-Z, a-z, 0-9 and _, -, .)")]
    InvalidCode(String),

    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
