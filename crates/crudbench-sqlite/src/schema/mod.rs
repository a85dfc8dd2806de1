//! Schema management and migrations
//!
//! One row per patient in `patients`, plus one row each in the three
//! dependent tables keyed by the same `patient_id`.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{SqliteError, SqliteResult};

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Every table holding patient data, parent last
pub const PATIENT_TABLES: [&str; 4] = ["lifestyle", "health_status", "diseases", "patients"];

/// Tables keyed by `patients.patient_id`
pub const DEPENDENT_TABLES: [&str; 3] = ["lifestyle", "health_status", "diseases"];

/// Apply all pending migrations
pub fn apply_migrations(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version = current_version(conn)?;
    debug!(current_version, target_version = SCHEMA_VERSION, "Checking migrations");

    if current_version < SCHEMA_VERSION {
        info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Applying schema migrations"
        );
        apply_migration_v1(conn)?;
    }

    Ok(())
}

fn current_version(conn: &Connection) -> SqliteResult<i32> {
    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

fn record_migration(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: normalized patient tables
fn apply_migration_v1(conn: &Connection) -> SqliteResult<()> {
    debug!("Applying migration v1: patient tables");

    conn.execute_batch(SCHEMA_V1)
        .map_err(|e| SqliteError::Schema(format!("Failed to apply v1 schema: {}", e)))?;

    record_migration(conn, 1)?;
    info!("Migration v1 applied successfully");
    Ok(())
}

const SCHEMA_V1: &str = r#"
-- ============================================================================
-- TABLE: patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id INTEGER PRIMARY KEY NOT NULL,
    sex INTEGER NOT NULL,
    age REAL NOT NULL,
    education INTEGER NOT NULL,
    income INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_education ON patients(education);
CREATE INDEX IF NOT EXISTS idx_patients_income ON patients(income);

-- ============================================================================
-- TABLE: lifestyle
-- ============================================================================

CREATE TABLE IF NOT EXISTS lifestyle (
    patient_id INTEGER PRIMARY KEY NOT NULL REFERENCES patients(patient_id),
    physical_activity INTEGER NOT NULL,
    smoker INTEGER NOT NULL,
    fruits INTEGER NOT NULL,
    veggies INTEGER NOT NULL
);

-- ============================================================================
-- TABLE: health_status
-- ============================================================================

CREATE TABLE IF NOT EXISTS health_status (
    patient_id INTEGER PRIMARY KEY NOT NULL REFERENCES patients(patient_id),
    gen_health INTEGER NOT NULL,
    ment_health_days INTEGER NOT NULL,
    phys_health_days INTEGER NOT NULL,
    difficulty_walking INTEGER NOT NULL
);

-- ============================================================================
-- TABLE: diseases
-- ============================================================================

CREATE TABLE IF NOT EXISTS diseases (
    patient_id INTEGER PRIMARY KEY NOT NULL REFERENCES patients(patient_id),
    heart_disease INTEGER NOT NULL,
    stroke INTEGER NOT NULL,
    diabetes INTEGER NOT NULL,
    high_blood_pressure INTEGER NOT NULL,
    high_cholesterol INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_diseases_bp_chol ON diseases(high_blood_pressure, high_cholesterol);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        apply_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 1);
    }

    #[test]
    fn test_dependent_rows_need_a_patient() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        apply_migrations(&conn).unwrap();

        let orphan = conn.execute(
            "INSERT INTO lifestyle (patient_id, physical_activity, smoker, fruits, veggies)
             VALUES (1, 1, 0, 1, 1)",
            [],
        );
        assert!(orphan.is_err());
    }
}
