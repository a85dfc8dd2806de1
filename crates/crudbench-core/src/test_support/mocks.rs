//! In-memory PatientStore for runner and contract tests
//!
//! [`MockPatientStore`] keeps patients in a `BTreeMap` keyed by id and
//! computes aggregates with the reference functions below. It is:
//!
//! - **Deterministic**: sampling uses a seeded ChaCha RNG
//! - **Configurable**: per-operation error injection and artificial delays
//! - **Observable**: call counters for asserting on runner behaviour
//!
//! # Example
//!
//! ```rust
//! use crudbench_core::test_support::mocks::MockPatientStore;
//! use crudbench_core::store::PatientStore;
//! use crudbench_core::synthetic::synthetic_patients;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MockPatientStore::new("memory");
//! let ids = store.insert(synthetic_patients(3, 1).into(), 3).await?;
//! assert_eq!(ids, vec![1, 2, 3]);
//! assert_eq!(store.stats().insert_calls, 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{StoreError, StoreResult};
use crate::operation::OperationKind;
use crate::patient::{
    sort_groups, EducationGroup, PatientRecord, AGGREGATE_INCOME_THRESHOLD,
    AGGREGATE_MIN_GROUP_SIZE,
};
use crate::store::PatientStore;

/// Call counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStoreStats {
    pub insert_calls: usize,
    pub read_calls: usize,
    pub update_calls: usize,
    pub delete_calls: usize,
    pub aggregate_calls: usize,
    pub reset_calls: usize,
}

impl MockStoreStats {
    pub fn calls(&self, op: OperationKind) -> usize {
        match op {
            OperationKind::Insert => self.insert_calls,
            OperationKind::Read => self.read_calls,
            OperationKind::Update => self.update_calls,
            OperationKind::Delete => self.delete_calls,
            OperationKind::AggregateVariant1 | OperationKind::AggregateVariant2 => {
                self.aggregate_calls
            }
        }
    }
}

struct MockState {
    patients: BTreeMap<i64, PatientRecord>,
    rng: ChaCha8Rng,
    stats: MockStoreStats,
    failing: HashSet<OperationKind>,
    delays: HashMap<OperationKind, Duration>,
    /// Global operation log, `(operation, size argument)`
    log: Vec<(OperationKind, usize)>,
    last_batch: Option<Arc<[PatientRecord]>>,
}

/// In-memory [`PatientStore`]
pub struct MockPatientStore {
    name: String,
    state: Mutex<MockState>,
}

impl MockPatientStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MockState {
                patients: BTreeMap::new(),
                rng: ChaCha8Rng::seed_from_u64(0),
                stats: MockStoreStats::default(),
                failing: HashSet::new(),
                delays: HashMap::new(),
                log: Vec::new(),
                last_batch: None,
            }),
        }
    }

    /// Make every call of `op` fail
    pub fn fail_on(&self, op: OperationKind) {
        self.state.lock().unwrap().failing.insert(op);
    }

    /// Sleep for `delay` before running `op`
    pub fn delay_on(&self, op: OperationKind, delay: Duration) {
        self.state.lock().unwrap().delays.insert(op, delay);
    }

    pub fn stats(&self) -> MockStoreStats {
        self.state.lock().unwrap().stats.clone()
    }

    /// Every call made so far, in order
    pub fn log(&self) -> Vec<(OperationKind, usize)> {
        self.state.lock().unwrap().log.clone()
    }

    /// Batch handed to the most recent insert
    pub fn last_insert_batch(&self) -> Option<Arc<[PatientRecord]>> {
        self.state.lock().unwrap().last_batch.clone()
    }

    /// Snapshot of the stored patients ordered by id
    pub fn patients(&self) -> Vec<PatientRecord> {
        self.state
            .lock()
            .unwrap()
            .patients
            .values()
            .cloned()
            .collect()
    }

    async fn enter(&self, op: OperationKind, size: usize) -> StoreResult<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.log.push((op, size));
            match op {
                OperationKind::Insert => state.stats.insert_calls += 1,
                OperationKind::Read => state.stats.read_calls += 1,
                OperationKind::Update => state.stats.update_calls += 1,
                OperationKind::Delete => state.stats.delete_calls += 1,
                OperationKind::AggregateVariant1 | OperationKind::AggregateVariant2 => {
                    state.stats.aggregate_calls += 1
                }
            }
            if state.failing.contains(&op) {
                return Err(StoreError::backend(format!("simulated {} failure", op)));
            }
            state.delays.get(&op).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn sample_ids(state: &mut MockState, sample_size: usize) -> Vec<i64> {
        let ids: Vec<i64> = state.patients.keys().copied().collect();
        ids.choose_multiple(&mut state.rng, sample_size)
            .copied()
            .collect()
    }
}

#[async_trait]
impl PatientStore for MockPatientStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn max_patient_id(&self) -> StoreResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.patients.keys().next_back().copied().unwrap_or(0))
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.state.lock().unwrap().patients.len() as u64)
    }

    async fn insert(&self, records: Arc<[PatientRecord]>, count: usize) -> StoreResult<Vec<i64>> {
        self.enter(OperationKind::Insert, count).await?;
        let mut state = self.state.lock().unwrap();
        let mut next = state.patients.keys().next_back().copied().unwrap_or(0);
        let mut ids = Vec::new();
        for record in records.iter().take(count) {
            next += 1;
            state.patients.insert(next, record.clone().with_id(next));
            ids.push(next);
        }
        state.last_batch = Some(records);
        Ok(ids)
    }

    async fn read(&self, limit: usize) -> StoreResult<Vec<PatientRecord>> {
        self.enter(OperationKind::Read, limit).await?;
        let state = self.state.lock().unwrap();
        Ok(state.patients.values().take(limit).cloned().collect())
    }

    async fn get(&self, patient_id: i64) -> StoreResult<Option<PatientRecord>> {
        Ok(self.state.lock().unwrap().patients.get(&patient_id).cloned())
    }

    async fn update(&self, sample_size: usize, delta: i64) -> StoreResult<Vec<i64>> {
        self.enter(OperationKind::Update, sample_size).await?;
        let mut state = self.state.lock().unwrap();
        let ids = Self::sample_ids(&mut state, sample_size);
        for id in &ids {
            if let Some(patient) = state.patients.get_mut(id) {
                patient.income += delta;
            }
        }
        Ok(ids)
    }

    async fn delete(&self, sample_size: usize) -> StoreResult<Vec<i64>> {
        self.enter(OperationKind::Delete, sample_size).await?;
        let mut state = self.state.lock().unwrap();
        let ids = Self::sample_ids(&mut state, sample_size);
        for id in &ids {
            state.patients.remove(id);
        }
        Ok(ids)
    }

    async fn aggregate_variant_1(&self, limit: usize) -> StoreResult<Vec<EducationGroup>> {
        self.enter(OperationKind::AggregateVariant1, limit).await?;
        Ok(expected_variant_1(&self.patients(), limit))
    }

    async fn aggregate_variant_2(&self, limit: usize) -> StoreResult<Vec<EducationGroup>> {
        self.enter(OperationKind::AggregateVariant2, limit).await?;
        Ok(expected_variant_2(&self.patients(), limit))
    }

    async fn reset(&self) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.stats.reset_calls += 1;
        state.patients.clear();
        Ok(())
    }
}

fn group_by_education<'a>(
    patients: impl Iterator<Item = &'a PatientRecord>,
    with_age: bool,
) -> Vec<EducationGroup> {
    let mut groups: BTreeMap<i64, (f64, f64, u64)> = BTreeMap::new();
    for p in patients {
        let entry = groups.entry(p.education).or_insert((0.0, 0.0, 0));
        entry.0 += p.age;
        entry.1 += p.income as f64;
        entry.2 += 1;
    }
    groups
        .into_iter()
        .map(|(education, (age, income, n))| EducationGroup {
            education,
            average_age: with_age.then(|| age / n as f64),
            average_income: income / n as f64,
            patient_count: n,
        })
        .collect()
}

/// Reference result of aggregate variant 1 over `patients`
pub fn expected_variant_1(patients: &[PatientRecord], limit: usize) -> Vec<EducationGroup> {
    let mut groups = group_by_education(
        patients
            .iter()
            .filter(|p| p.high_blood_pressure && p.high_cholesterol),
        true,
    );
    sort_groups(&mut groups);
    groups.truncate(limit);
    groups
}

/// Reference result of aggregate variant 2 over `patients`
pub fn expected_variant_2(patients: &[PatientRecord], limit: usize) -> Vec<EducationGroup> {
    if patients.is_empty() {
        return Vec::new();
    }
    let population_mean =
        patients.iter().map(|p| p.income as f64).sum::<f64>() / patients.len() as f64;
    let mut groups: Vec<EducationGroup> = group_by_education(
        patients.iter().filter(|p| p.income as f64 > population_mean),
        false,
    )
    .into_iter()
    .filter(|g| {
        g.patient_count > AGGREGATE_MIN_GROUP_SIZE && g.average_income > AGGREGATE_INCOME_THRESHOLD
    })
    .collect();
    sort_groups(&mut groups);
    groups.truncate(limit);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::synthetic_patients;

    fn patient(education: i64, income: i64, flagged: bool) -> PatientRecord {
        PatientRecord {
            education,
            income,
            age: 5.0,
            high_blood_pressure: flagged,
            high_cholesterol: flagged,
            ..PatientRecord::default()
        }
    }

    #[test]
    fn test_variant_1_filters_and_orders() {
        let patients = vec![
            patient(1, 10_000, true),
            patient(1, 20_000, true),
            patient(2, 90_000, true),
            patient(3, 99_000, false),
        ];
        let groups = expected_variant_1(&patients, 10);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].education, 2);
        assert_eq!(groups[1].education, 1);
        assert_eq!(groups[1].average_income, 15_000.0);
        assert_eq!(groups[1].patient_count, 2);
        assert_eq!(groups[1].average_age, Some(5.0));
    }

    #[test]
    fn test_variant_2_requires_more_than_five_members() {
        let mut patients: Vec<PatientRecord> =
            (0..6).map(|_| patient(4, 80_000, false)).collect();
        patients.extend((0..5).map(|_| patient(5, 90_000, false)));
        patients.extend((0..20).map(|_| patient(1, 10_000, false)));

        let groups = expected_variant_2(&patients, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].education, 4);
        assert_eq!(groups[0].patient_count, 6);
        assert_eq!(groups[0].average_age, None);
    }

    #[test]
    fn test_variant_2_empty_population() {
        assert!(expected_variant_2(&[], 10).is_empty());
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let store = MockPatientStore::new("memory");
        store.fail_on(OperationKind::Read);

        store.insert(synthetic_patients(4, 1).into(), 4).await.unwrap();
        assert!(store.read(4).await.is_err());
        assert_eq!(store.stats().read_calls, 1);
        assert_eq!(store.stats().calls(OperationKind::Insert), 1);
        assert_eq!(store.stats().calls(OperationKind::AggregateVariant1), 0);
        assert_eq!(
            store.log(),
            vec![(OperationKind::Insert, 4), (OperationKind::Read, 4)]
        );
    }
}
