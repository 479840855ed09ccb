//! Database error types.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// Input rejected before reaching the database
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A stored value could not be mapped back to a domain type
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}

impl From<print_core::CoreError> for DatabaseError {
    fn from(err: print_core::CoreError) -> Self {
        DatabaseError::InvalidData(err.to_string())
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
