//! Error types for the SQLite driver

use crudbench_core::StoreError;
use thiserror::Error;

/// SQLite driver error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema/migration error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Blocking task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// Caller stopped waiting; the call was rolled back
    #[error("Call cancelled by caller")]
    Cancelled,

    /// Stored data does not fit the patient model
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Connection(msg) => Self::Backend(msg),
            SqliteError::Schema(msg) => Self::Backend(format!("schema: {}", msg)),
            SqliteError::Task(msg) => Self::Backend(format!("blocking task: {}", msg)),
            SqliteError::Cancelled => Self::Backend("call cancelled".to_string()),
            SqliteError::InvalidData(msg) => Self::Serialization(msg),
            SqliteError::Rusqlite(e) => Self::Backend(e.to_string()),
        }
    }
}
