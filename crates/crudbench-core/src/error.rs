//! Error types
//!
//! The taxonomy follows what the caller can do about a failure:
//!
//! - [`FormatError`] - bad input record; the loader's [`MalformedPolicy`]
//!   decides between skipping and aborting.
//! - [`StoreError`] - raised by a driver; wrapped into [`BackendError`] by the
//!   runner, which records a failed cell and moves on.
//! - [`SinkError`] - persisting results failed; terminal for the run.
//! - [`BenchError`] - the run itself could not proceed.
//!
//! [`MalformedPolicy`]: crate::source::MalformedPolicy

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::operation::OperationKind;

/// Input record is missing a field or a field cannot be coerced
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("{source_name}: record {index}: missing field '{field}'")]
    MissingField {
        source_name: String,
        index: usize,
        field: String,
    },

    #[error("{source_name}: record {index}: field '{field}' has invalid value '{value}'")]
    InvalidValue {
        source_name: String,
        index: usize,
        field: String,
        value: String,
    },

    #[error("{source_name}: {message}")]
    Malformed { source_name: String, message: String },
}

impl FormatError {
    /// Record index the error refers to, if any
    pub fn record_index(&self) -> Option<usize> {
        match self {
            Self::MissingField { index, .. } | Self::InvalidValue { index, .. } => Some(*index),
            Self::Malformed { .. } => None,
        }
    }
}

/// Failure reported by a backend driver
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout error: operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for driver operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create a generic backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A driver failure attributed to a backend, operation and workload tier
#[derive(Error, Debug, Clone)]
#[error("{backend} {operation} at size {workload_size} failed: {source}")]
pub struct BackendError {
    pub backend: String,
    pub operation: OperationKind,
    pub workload_size: usize,
    #[source]
    pub source: StoreError,
}

/// Persisting a benchmark run failed
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Destination {path} is not writable: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Result file {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Failed to encode results: {0}")]
    Encoding(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors that stop a benchmark run
#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend}: {source}")]
    Store {
        backend: String,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid phase transition from {from} to {to}")]
    PhaseTransition { from: String, to: String },
}

/// Result type for runner operations
pub type BenchResult<T> = Result<T, BenchError>;
