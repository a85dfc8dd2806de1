//! Error types for the SurrealDB driver

use crudbench_core::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Connection(msg) => Self::Backend(msg),
            DbError::Query(msg) => Self::Backend(msg),
            DbError::Schema(msg) => Self::Backend(format!("schema: {}", msg)),
            DbError::Decode(msg) => Self::Serialization(msg),
        }
    }
}
