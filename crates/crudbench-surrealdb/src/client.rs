//! SurrealDB client
//!
//! Thin wrapper around `Surreal<Any>`, so the same driver talks to an
//! in-process `mem://` datastore or a remote server depending on the
//! configured endpoint.
//!
//! ## Usage
//!
//! ```no_run
//! use crudbench_surrealdb::SurrealClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SurrealClient::new_memory().await?;
//! client.db().query("INFO FOR DB").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::config::SurrealDbConfig;
use crate::error::{DbError, DbResult};

/// Table holding one document per patient
pub const PATIENT_TABLE: &str = "patient";

const SCHEMA: &str = "
    DEFINE TABLE IF NOT EXISTS patient SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS patient_id_idx ON TABLE patient FIELDS patient_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS education_idx ON TABLE patient FIELDS demographics.education;
";

/// Cheap to clone; every clone shares one connection
#[derive(Clone)]
pub struct SurrealClient {
    inner: Arc<SurrealClientInner>,
}

struct SurrealClientInner {
    db: Surreal<Any>,
    config: SurrealDbConfig,
}

impl std::fmt::Debug for SurrealClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealClient")
            .field("endpoint", &self.inner.config.endpoint)
            .field("namespace", &self.inner.config.namespace)
            .field("database", &self.inner.config.database)
            .finish()
    }
}

impl SurrealClient {
    /// Connect, sign in if credentials are configured, select the namespace
    /// and database, and define the patient table
    pub async fn new(config: SurrealDbConfig) -> DbResult<Self> {
        info!(endpoint = %config.endpoint, "Connecting to SurrealDB");

        let timeout = Duration::from_secs(config.connect_timeout_seconds.max(1));
        let db = tokio::time::timeout(timeout, any::connect(config.endpoint.as_str()))
            .await
            .map_err(|_| {
                DbError::Connection(format!(
                    "Timed out connecting to {} after {}s",
                    config.endpoint,
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                DbError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if let Some((username, password)) = config.credentials() {
            db.signin(Root { username, password })
                .await
                .map_err(|e| DbError::Connection(format!("Sign-in failed: {}", e)))?;
            debug!(username, "Signed in as root user");
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| {
                DbError::Connection(format!(
                    "Failed to use namespace '{}' and database '{}': {}",
                    config.namespace, config.database, e
                ))
            })?;

        let client = Self {
            inner: Arc::new(SurrealClientInner { db, config }),
        };
        client.define_schema().await?;
        Ok(client)
    }

    /// In-process datastore; every call gets a fresh, empty one
    pub async fn new_memory() -> DbResult<Self> {
        Self::new(SurrealDbConfig::memory()).await
    }

    async fn define_schema(&self) -> DbResult<()> {
        self.inner
            .db
            .query(SCHEMA)
            .await
            .and_then(|response| response.check())
            .map_err(|e| DbError::Schema(format!("Failed to define patient table: {}", e)))?;
        debug!(table = PATIENT_TABLE, "Patient table defined");
        Ok(())
    }

    /// Underlying SDK handle
    pub fn db(&self) -> &Surreal<Any> {
        &self.inner.db
    }

    pub fn config(&self) -> &SurrealDbConfig {
        &self.inner.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_client_defines_schema() {
        let client = SurrealClient::new_memory().await.unwrap();
        assert!(client.config().is_memory());

        let mut response = client
            .db()
            .query("SELECT VALUE patient_id FROM patient")
            .await
            .unwrap()
            .check()
            .unwrap();
        let ids: Vec<i64> = response.take(0).unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let config = SurrealDbConfig {
            endpoint: "ws://127.0.0.1:1".to_string(),
            connect_timeout_seconds: 2,
            ..SurrealDbConfig::default()
        };
        let err = SurrealClient::new(config).await.unwrap_err();
        assert!(matches!(err, DbError::Connection(_)));
    }
}
