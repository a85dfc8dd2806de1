//! SQLite connection handle
//!
//! A single `Arc<Mutex<Connection>>`. The runner never overlaps calls, so one
//! connection is all the relational driver needs, and the mutex keeps the
//! handle `Send + Sync` for the blocking tasks that use it.
//!
//! The interrupt handle lives outside the mutex so a caller that gives up on
//! a call can abort the statement still holding the lock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, InterruptHandle};
use tracing::{debug, info};

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};
use crate::schema;

/// Thread-safe SQLite connection wrapper
#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    config: SqliteConfig,
}

impl SqlitePool {
    /// Open the database, configure pragmas and apply the schema
    pub fn new(config: SqliteConfig) -> SqliteResult<Self> {
        info!(path = ?config.path, "Opening SQLite database");

        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SqliteError::Connection(format!("Failed to create directory: {}", e))
                })?;
            }
            Connection::open(&config.path)?
        };

        let interrupt = Arc::new(conn.get_interrupt_handle());
        let pool = Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            config,
        };
        pool.initialize()?;
        Ok(pool)
    }

    /// In-memory database for tests
    pub fn memory() -> SqliteResult<Self> {
        Self::new(SqliteConfig::memory())
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Abort whatever statement is running on the connection
    pub fn interrupt_handle(&self) -> Arc<InterruptHandle> {
        Arc::clone(&self.interrupt)
    }

    /// Execute a closure with the connection
    pub fn with_connection<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a closure with mutable access to the connection
    pub fn with_connection_mut<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&mut Connection) -> SqliteResult<T>,
    {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    fn initialize(&self) -> SqliteResult<()> {
        self.with_connection(|conn| {
            self.configure_pragmas(conn)?;
            schema::apply_migrations(conn)?;
            info!("SQLite database initialized");
            Ok(())
        })
    }

    fn configure_pragmas(&self, conn: &Connection) -> SqliteResult<()> {
        debug!("Configuring SQLite pragmas");

        // WAL has no meaning for a private in-memory database
        if self.config.wal_mode && !self.config.is_memory() {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "Journal mode set");
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }

        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)?;
        conn.busy_timeout(Duration::from_millis(u64::from(self.config.busy_timeout_ms)))?;
        conn.pragma_update(None, "cache_size", self.config.cache_size)?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        Ok(())
    }
}
