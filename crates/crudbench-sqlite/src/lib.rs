//! Relational backend for crudbench
//!
//! Stores each patient across four normalized SQLite tables (`patients`,
//! `lifestyle`, `health_status`, `diseases`) and implements
//! [`crudbench_core::PatientStore`] on top of them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crudbench_sqlite::{SqliteConfig, SqlitePatientStore, SqlitePool};
//! use crudbench_core::PatientStore;
//!
//! let pool = SqlitePool::new(SqliteConfig::new("./crudbench.db"))?;
//! let store = SqlitePatientStore::new(pool);
//! let first = store.read(10).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod schema;
pub mod store;

pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
pub use store::{SqlitePatientStore, TableCounts, BACKEND_NAME};

/// Open (or create) the database described by `config` and wrap it in a store
pub fn open_store(config: SqliteConfig) -> SqliteResult<SqlitePatientStore> {
    Ok(SqlitePatientStore::new(SqlitePool::new(config)?))
}
