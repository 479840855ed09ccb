//! Error types for core validation.

use thiserror::Error;

/// Errors raised while validating wire payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A required field was missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A field held a value outside its allowed set.
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Result type for core validation.
pub type Result<T> = std::result::Result<T, CoreError>;
