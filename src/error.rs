/// Error types for crud-demo
///
/// This module defines all possible errors that can occur in the application.
/// Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Main error type for crud-demo operations
#[derive(Error, Debug)]
pub enum CrudError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not open the database handle
    #[error("Connection error: {0}")]
    Connect(String),

    /// Table could not be reconciled with the record shape
    #[error("Schema error: {0}")]
    Schema(String),

    /// Table or column name that is unsafe to splice into SQL
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Filter or patch named a field the shape does not have
    #[error("Unknown field '{field}' on {shape}")]
    UnknownField { shape: &'static str, field: String },

    /// Update/delete without a primary key or any predicate
    #[error("Refusing to {0} without a primary key or filter; use the explicit all-rows operation")]
    UnboundedMutation(&'static str),

    /// Update with nothing to write
    #[error("No fields to update")]
    EmptyUpdate,

    /// Insert of a value that already carries an id
    #[error("Record already has id {0}")]
    IdAlreadyAssigned(i64),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for crud-demo operations
pub type Result<T> = std::result::Result<T, CrudError>;

/// Convert CrudError to a user-friendly error message
impl CrudError {
    pub fn user_message(&self) -> String {
        match self {
            CrudError::Database(e) => {
                format!("Database error occurred. Details: {}", e)
            }
            CrudError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            CrudError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
            CrudError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
            CrudError::Connect(msg) => {
                format!("Could not connect to the database: {}", msg)
            }
            CrudError::Schema(msg) => {
                format!("Table does not match the record shape: {}", msg)
            }
            CrudError::InvalidIdentifier(name) => {
                format!("'{}' is not a valid table or column name", name)
            }
            CrudError::UnknownField { shape, field } => {
                format!("{} has no field or column named '{}'", shape, field)
            }
            CrudError::UnboundedMutation(op) => {
                format!(
                    "Refusing to {} every row. Pass a primary key or a filter, or use the all-rows operation",
                    op
                )
            }
            CrudError::EmptyUpdate => "Nothing to update: no field was set".to_string(),
            CrudError::IdAlreadyAssigned(id) => {
                format!("Record already has id {} and cannot be inserted again", id)
            }
            CrudError::Generic(msg) => msg.clone(),
        }
    }
}
