//! PatientStore: the operation contract shared by every backend driver
//!
//! Both drivers store the same logical population in very different shapes
//! (nested documents vs four normalized tables). The contract below is what
//! keeps their timings comparable: the same inputs must produce the same
//! observable effects on either backend.
//!
//! # Identifier assignment
//!
//! `insert` continues from the largest `patient_id` currently stored, read
//! from the backend itself rather than from a counter in memory, so inserting
//! several times in one run never collides. This assumes the harness has the
//! backend to itself for the duration of a run; concurrent external writers
//! are not supported.
//!
//! # Random sampling
//!
//! `update` and `delete` pick their victims with the backend's own random
//! ordering (`ORDER BY RANDOM()` in SQL, `ORDER BY rand()` in SurrealQL).
//! Both are uniform without replacement, but their cost profiles differ, so
//! comparing these two columns across backends is an approximation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::patient::{EducationGroup, PatientRecord};

/// Backend driver contract
///
/// Implementations own their connection handle and must not leave a
/// transaction or cursor open between calls.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Backend name used for result columns and error attribution
    fn name(&self) -> &str;

    /// Largest stored `patient_id`, `0` when empty
    async fn max_patient_id(&self) -> StoreResult<i64>;

    /// Number of stored patients
    async fn count(&self) -> StoreResult<u64>;

    /// Write the first `count` records (or all of them if fewer)
    ///
    /// Identifiers on the input are ignored; fresh ones start at
    /// `max_patient_id() + 1`. Returns the assigned identifiers in order.
    /// The batch is shared so a driver can hand it to another thread
    /// without copying it inside the timed call.
    async fn insert(&self, records: Arc<[PatientRecord]>, count: usize) -> StoreResult<Vec<i64>>;

    /// Up to `limit` patients ordered by `patient_id`
    async fn read(&self, limit: usize) -> StoreResult<Vec<PatientRecord>>;

    /// Fetch one patient
    async fn get(&self, patient_id: i64) -> StoreResult<Option<PatientRecord>>;

    /// Add `delta` to the income of `sample_size` randomly chosen patients
    ///
    /// Returns the identifiers that were updated.
    async fn update(&self, sample_size: usize, delta: i64) -> StoreResult<Vec<i64>>;

    /// Remove `sample_size` randomly chosen patients and everything hanging
    /// off them
    ///
    /// Returns the identifiers that were removed.
    async fn delete(&self, sample_size: usize) -> StoreResult<Vec<i64>>;

    /// Patients with both hypertension and high cholesterol, grouped by
    /// education, with average age, average income and count per group,
    /// sorted by average income descending, top `limit` groups
    async fn aggregate_variant_1(&self, limit: usize) -> StoreResult<Vec<EducationGroup>>;

    /// Patients earning above the population average, grouped by education,
    /// keeping groups with more than 5 members and average income above
    /// 50 000, sorted by average income descending, top `limit` groups
    async fn aggregate_variant_2(&self, limit: usize) -> StoreResult<Vec<EducationGroup>>;

    /// Remove every patient
    async fn reset(&self) -> StoreResult<()>;
}
