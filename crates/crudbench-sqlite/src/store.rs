//! Relational PatientStore
//!
//! Every patient is split across four tables. Reads join them back together,
//! deletes remove the dependent rows before the parent row, and every
//! multi-statement operation runs in one transaction.
//!
//! rusqlite is synchronous, so each call moves onto the blocking pool. That
//! keeps the runtime free for the runner's timeout to fire. A call whose
//! future is dropped before it finishes is cancelled: the running statement
//! is interrupted, write loops stop at the next record, and the open
//! transaction rolls back, so an abandoned call leaves no trace and does not
//! hold the connection for the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, InterruptHandle, OptionalExtension, Row, Transaction};
use tracing::debug;

use crudbench_core::{
    EducationGroup, PatientRecord, PatientStore, StoreResult, AGGREGATE_INCOME_THRESHOLD,
    AGGREGATE_MIN_GROUP_SIZE,
};

use crate::connection::SqlitePool;
use crate::error::{SqliteError, SqliteResult};
use crate::schema::{DEPENDENT_TABLES, PATIENT_TABLES};

/// Backend name reported in results
pub const BACKEND_NAME: &str = "sqlite";

const SELECT_PATIENT: &str = "
    SELECT p.patient_id, p.sex, p.age, p.education, p.income,
           h.gen_health, h.ment_health_days, h.phys_health_days, h.difficulty_walking,
           l.physical_activity, l.smoker, l.fruits, l.veggies,
           d.heart_disease, d.stroke, d.diabetes, d.high_blood_pressure, d.high_cholesterol
    FROM patients p
    JOIN health_status h ON h.patient_id = p.patient_id
    JOIN lifestyle l ON l.patient_id = p.patient_id
    JOIN diseases d ON d.patient_id = p.patient_id";

const AGGREGATE_VARIANT_1: &str = "
    SELECT p.education, AVG(p.age), AVG(p.income), COUNT(*)
    FROM patients p
    JOIN diseases d ON d.patient_id = p.patient_id
    WHERE d.high_blood_pressure = 1 AND d.high_cholesterol = 1
    GROUP BY p.education
    ORDER BY AVG(p.income) DESC, p.education ASC
    LIMIT ?1";

const AGGREGATE_VARIANT_2: &str = "
    SELECT p.education, AVG(p.income), COUNT(*)
    FROM patients p
    WHERE p.income > (SELECT AVG(income) FROM patients)
    GROUP BY p.education
    HAVING COUNT(*) > ?2 AND AVG(p.income) > ?3
    ORDER BY AVG(p.income) DESC, p.education ASC
    LIMIT ?1";

/// Row counts per table, for checking that deletes leave no orphans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub patients: u64,
    pub lifestyle: u64,
    pub health_status: u64,
    pub diseases: u64,
}

impl TableCounts {
    /// Every dependent table has exactly one row per patient
    pub fn is_consistent(&self) -> bool {
        self.lifestyle == self.patients
            && self.health_status == self.patients
            && self.diseases == self.patients
    }
}

/// Raised once the caller has stopped waiting for a blocking call
#[derive(Clone, Default)]
struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    fn check(&self) -> SqliteResult<()> {
        if self.0.load(Ordering::Acquire) {
            Err(SqliteError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancels the guarded call on drop unless it completed
struct CallGuard {
    cancel: Cancellation,
    interrupt: Arc<InterruptHandle>,
    completed: bool,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.cancel.0.store(true, Ordering::Release);
            self.interrupt.interrupt();
            debug!("Abandoned SQLite call cancelled");
        }
    }
}

/// SQLite implementation of [`PatientStore`]
#[derive(Clone)]
pub struct SqlitePatientStore {
    pool: SqlitePool,
}

impl SqlitePatientStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `f` against the connection on the blocking pool
    ///
    /// Long write loops receive the [`Cancellation`] and check it between
    /// records; single statements are stopped by the interrupt.
    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection, &Cancellation) -> SqliteResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let cancel = Cancellation::default();
        let mut guard = CallGuard {
            cancel: cancel.clone(),
            interrupt: pool.interrupt_handle(),
            completed: false,
        };
        let outcome = tokio::task::spawn_blocking(move || {
            pool.with_connection_mut(|conn| {
                cancel.check()?;
                f(conn, &cancel)
            })
        })
        .await
        .map_err(|e| SqliteError::Task(e.to_string()));
        guard.completed = true;
        Ok(outcome??)
    }

    /// Row counts of all four patient tables
    pub async fn table_counts(&self) -> StoreResult<TableCounts> {
        self.blocking(|conn, _| {
            let count = |table: &str| -> SqliteResult<u64> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                Ok(n as u64)
            };
            Ok(TableCounts {
                patients: count("patients")?,
                lifestyle: count("lifestyle")?,
                health_status: count("health_status")?,
                diseases: count("diseases")?,
            })
        })
        .await
    }

    /// Rows in the dependent tables that belong to any of `ids`
    ///
    /// Zero for identifiers returned by `delete`.
    pub async fn dependent_row_count(&self, ids: &[i64]) -> StoreResult<u64> {
        let ids = ids.to_vec();
        self.blocking(move |conn, _| {
            let mut total = 0;
            for table in DEPENDENT_TABLES {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT COUNT(*) FROM {} WHERE patient_id = ?1",
                    table
                ))?;
                for id in &ids {
                    let n: i64 = stmt.query_row([id], |row| row.get(0))?;
                    total += group_count(n)?;
                }
            }
            Ok(total)
        })
        .await
    }
}

fn sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
    Ok(PatientRecord {
        patient_id: row.get(0)?,
        sex: row.get(1)?,
        age: row.get(2)?,
        education: row.get(3)?,
        income: row.get(4)?,
        gen_health: row.get(5)?,
        ment_health_days: row.get(6)?,
        phys_health_days: row.get(7)?,
        difficulty_walking: row.get(8)?,
        physical_activity: row.get(9)?,
        smoker: row.get(10)?,
        fruits: row.get(11)?,
        veggies: row.get(12)?,
        heart_disease: row.get(13)?,
        stroke: row.get(14)?,
        diabetes: row.get(15)?,
        high_blood_pressure: row.get(16)?,
        high_cholesterol: row.get(17)?,
    })
}

fn max_id(conn: &Connection) -> SqliteResult<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(patient_id), 0) FROM patients",
        [],
        |row| row.get(0),
    )?)
}

fn sample_ids(tx: &Transaction<'_>, sample_size: usize) -> SqliteResult<Vec<i64>> {
    let mut stmt = tx.prepare_cached("SELECT patient_id FROM patients ORDER BY RANDOM() LIMIT ?1")?;
    let ids = stmt
        .query_map([sql_limit(sample_size)], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Write `p` under `id`; the record's own identifier is ignored
fn write_patient(tx: &Transaction<'_>, id: i64, p: &PatientRecord) -> SqliteResult<()> {
    tx.prepare_cached(
        "INSERT INTO patients (patient_id, sex, age, education, income)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![id, p.sex, p.age, p.education, p.income])?;
    tx.prepare_cached(
        "INSERT INTO lifestyle (patient_id, physical_activity, smoker, fruits, veggies)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![
        id,
        p.physical_activity,
        p.smoker,
        p.fruits,
        p.veggies
    ])?;
    tx.prepare_cached(
        "INSERT INTO health_status
            (patient_id, gen_health, ment_health_days, phys_health_days, difficulty_walking)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![
        id,
        p.gen_health,
        p.ment_health_days,
        p.phys_health_days,
        p.difficulty_walking
    ])?;
    tx.prepare_cached(
        "INSERT INTO diseases
            (patient_id, heart_disease, stroke, diabetes, high_blood_pressure, high_cholesterol)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?
    .execute(params![
        id,
        p.heart_disease,
        p.stroke,
        p.diabetes,
        p.high_blood_pressure,
        p.high_cholesterol
    ])?;
    Ok(())
}

fn group_count(n: i64) -> SqliteResult<u64> {
    u64::try_from(n).map_err(|_| SqliteError::InvalidData(format!("negative group count {}", n)))
}

#[async_trait]
impl PatientStore for SqlitePatientStore {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn max_patient_id(&self) -> StoreResult<i64> {
        self.blocking(|conn, _| max_id(conn)).await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.blocking(|conn, _| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
            group_count(n)
        })
        .await
    }

    async fn insert(&self, records: Arc<[PatientRecord]>, count: usize) -> StoreResult<Vec<i64>> {
        let len = count.min(records.len());
        if len == 0 {
            return Ok(Vec::new());
        }
        self.blocking(move |conn, cancel| {
            let tx = conn.transaction()?;
            let start = max_id(&tx)? + 1;
            let mut ids = Vec::with_capacity(len);
            for (offset, record) in records[..len].iter().enumerate() {
                cancel.check()?;
                let id = start + offset as i64;
                write_patient(&tx, id, record)?;
                ids.push(id);
            }
            cancel.check()?;
            tx.commit()?;
            debug!(inserted = ids.len(), first_id = start, "Inserted patients");
            Ok(ids)
        })
        .await
    }

    async fn read(&self, limit: usize) -> StoreResult<Vec<PatientRecord>> {
        self.blocking(move |conn, _| {
            let mut stmt =
                conn.prepare_cached(&format!("{} ORDER BY p.patient_id LIMIT ?1", SELECT_PATIENT))?;
            let patients = stmt
                .query_map([sql_limit(limit)], patient_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(patients)
        })
        .await
    }

    async fn get(&self, patient_id: i64) -> StoreResult<Option<PatientRecord>> {
        self.blocking(move |conn, _| {
            let patient = conn
                .query_row(
                    &format!("{} WHERE p.patient_id = ?1", SELECT_PATIENT),
                    [patient_id],
                    patient_from_row,
                )
                .optional()?;
            Ok(patient)
        })
        .await
    }

    async fn update(&self, sample_size: usize, delta: i64) -> StoreResult<Vec<i64>> {
        self.blocking(move |conn, cancel| {
            let tx = conn.transaction()?;
            let ids = sample_ids(&tx, sample_size)?;
            {
                let mut stmt = tx.prepare_cached(
                    "UPDATE patients SET income = income + ?1 WHERE patient_id = ?2",
                )?;
                for id in &ids {
                    cancel.check()?;
                    stmt.execute(params![delta, id])?;
                }
            }
            cancel.check()?;
            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    async fn delete(&self, sample_size: usize) -> StoreResult<Vec<i64>> {
        self.blocking(move |conn, cancel| {
            let tx = conn.transaction()?;
            let ids = sample_ids(&tx, sample_size)?;
            for id in &ids {
                cancel.check()?;
                for table in PATIENT_TABLES {
                    tx.prepare_cached(&format!("DELETE FROM {} WHERE patient_id = ?1", table))?
                        .execute([id])?;
                }
            }
            cancel.check()?;
            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    async fn aggregate_variant_1(&self, limit: usize) -> StoreResult<Vec<EducationGroup>> {
        self.blocking(move |conn, _| {
            let mut stmt = conn.prepare_cached(AGGREGATE_VARIANT_1)?;
            let rows = stmt
                .query_map([sql_limit(limit)], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(education, age, income, n)| {
                    Ok(EducationGroup {
                        education,
                        average_age: Some(age),
                        average_income: income,
                        patient_count: group_count(n)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn aggregate_variant_2(&self, limit: usize) -> StoreResult<Vec<EducationGroup>> {
        self.blocking(move |conn, _| {
            let mut stmt = conn.prepare_cached(AGGREGATE_VARIANT_2)?;
            let rows = stmt
                .query_map(
                    params![
                        sql_limit(limit),
                        AGGREGATE_MIN_GROUP_SIZE as i64,
                        AGGREGATE_INCOME_THRESHOLD
                    ],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(education, income, n)| {
                    Ok(EducationGroup {
                        education,
                        average_age: None,
                        average_income: income,
                        patient_count: group_count(n)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn reset(&self) -> StoreResult<()> {
        self.blocking(|conn, cancel| {
            let tx = conn.transaction()?;
            for table in PATIENT_TABLES {
                tx.execute(&format!("DELETE FROM {}", table), [])?;
            }
            cancel.check()?;
            tx.commit()?;
            debug!("Cleared patient tables");
            Ok(())
        })
        .await
    }
}
