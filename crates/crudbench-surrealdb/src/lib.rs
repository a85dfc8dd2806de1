//! Document backend for crudbench
//!
//! Stores each patient as one nested document (`demographics`,
//! `health_status`, `lifestyle`, `diseases`) in a SurrealDB table and
//! implements [`crudbench_core::PatientStore`] on top of it.
//!
//! ## Supported Endpoints
//!
//! - **Memory** (`mem://`): in-process datastore, the default
//! - **Server** (`ws://host:port`): a running SurrealDB instance

pub mod client;
pub mod config;
pub mod error;
pub mod store;

pub use client::{SurrealClient, PATIENT_TABLE};
pub use config::SurrealDbConfig;
pub use error::{DbError, DbResult};
pub use store::{SurrealPatientStore, BACKEND_NAME};

/// Connect using `config` and wrap the client in a store
pub async fn open_store(config: SurrealDbConfig) -> DbResult<SurrealPatientStore> {
    Ok(SurrealPatientStore::new(SurrealClient::new(config).await?))
}
