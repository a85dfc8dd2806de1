//! Behavioural contract every [`PatientStore`] driver must satisfy
//!
//! Driver crates call these from their own integration tests with a fresh,
//! isolated store. Each check resets the store first and panics with a
//! descriptive message on the first violation.

use std::collections::HashSet;
use std::sync::Arc;

use crate::patient::{EducationGroup, PatientRecord, INCOME_DELTA};
use crate::store::PatientStore;
use crate::synthetic::synthetic_patients;

use super::mocks::{expected_variant_1, expected_variant_2};

const RELATIVE_TOLERANCE: f64 = 1e-9;

/// Run every check in sequence
pub async fn run_contract_suite(store: &dyn PatientStore) {
    check_empty_store(store).await;
    check_crud_scenario(store).await;
    check_zero_insert(store).await;
    check_ids_continue_across_inserts(store).await;
    check_oversized_requests(store).await;
    check_round_trip(store).await;
    check_aggregates_match_reference(store).await;
    check_reset(store).await;
}

async fn fresh(store: &dyn PatientStore) {
    store.reset().await.expect("reset failed");
    assert_eq!(store.count().await.expect("count failed"), 0);
}

/// Reads and aggregates on an empty store return nothing
pub async fn check_empty_store(store: &dyn PatientStore) {
    fresh(store).await;

    assert_eq!(store.max_patient_id().await.unwrap(), 0);
    assert!(store.read(10).await.unwrap().is_empty());
    assert!(store.update(5, INCOME_DELTA).await.unwrap().is_empty());
    assert!(store.delete(5).await.unwrap().is_empty());
    assert!(store.aggregate_variant_1(10).await.unwrap().is_empty());
    assert!(store.aggregate_variant_2(10).await.unwrap().is_empty());
    assert!(store.get(1).await.unwrap().is_none());
}

/// Insert 10, read 10, update 3, delete 3
pub async fn check_crud_scenario(store: &dyn PatientStore) {
    fresh(store).await;
    let input: Arc<[PatientRecord]> = synthetic_patients(10, 11).into();

    let ids = store.insert(Arc::clone(&input), 10).await.unwrap();
    assert_eq!(ids, (1..=10).collect::<Vec<i64>>());

    let read = store.read(10).await.unwrap();
    assert_eq!(
        read.iter().map(|p| p.patient_id).collect::<Vec<_>>(),
        (1..=10).collect::<Vec<i64>>(),
        "read must return patients ordered by id"
    );
    for (stored, original) in read.iter().zip(input.iter()) {
        assert!(
            stored.same_values(original),
            "{}: stored {:?} differs from input {:?}",
            store.name(),
            stored,
            original
        );
    }

    let updated = store.update(3, INCOME_DELTA).await.unwrap();
    assert_distinct(&updated, 3, "update");
    let after_update = store.read(10).await.unwrap();
    for (before, after) in read.iter().zip(&after_update) {
        let expected = if updated.contains(&before.patient_id) {
            before.income + INCOME_DELTA
        } else {
            before.income
        };
        assert_eq!(
            after.income, expected,
            "{}: patient {} income",
            store.name(),
            before.patient_id
        );
    }

    let deleted = store.delete(3).await.unwrap();
    assert_distinct(&deleted, 3, "delete");
    assert_eq!(store.count().await.unwrap(), 7);
    for id in &deleted {
        assert!(store.get(*id).await.unwrap().is_none());
    }
}

/// A zero-sized insert writes nothing and leaves the max id alone
pub async fn check_zero_insert(store: &dyn PatientStore) {
    fresh(store).await;
    let input: Arc<[PatientRecord]> = synthetic_patients(5, 3).into();
    store.insert(Arc::clone(&input), 5).await.unwrap();

    let ids = store.insert(Arc::clone(&input), 0).await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(store.max_patient_id().await.unwrap(), 5);
    assert_eq!(store.count().await.unwrap(), 5);
}

/// Repeated inserts continue from the stored maximum, even after deletes
pub async fn check_ids_continue_across_inserts(store: &dyn PatientStore) {
    fresh(store).await;
    let input: Arc<[PatientRecord]> = synthetic_patients(5, 4).into();

    assert_eq!(store.insert(Arc::clone(&input), 5).await.unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(store.insert(Arc::clone(&input), 5).await.unwrap(), vec![6, 7, 8, 9, 10]);

    let max_before = store.max_patient_id().await.unwrap();
    store.delete(4).await.unwrap();
    let max_after = store.max_patient_id().await.unwrap();
    let next = store.insert(Arc::clone(&input), 1).await.unwrap();
    assert_eq!(next, vec![max_after + 1]);
    assert!(max_after <= max_before);
}

/// Sizes beyond what is available are clamped
pub async fn check_oversized_requests(store: &dyn PatientStore) {
    fresh(store).await;
    let input: Arc<[PatientRecord]> = synthetic_patients(6, 5).into();

    assert_eq!(store.insert(Arc::clone(&input), 100).await.unwrap().len(), 6);
    assert_eq!(store.read(100).await.unwrap().len(), 6);
    assert_distinct(&store.update(100, INCOME_DELTA).await.unwrap(), 6, "update");
    assert_distinct(&store.delete(100).await.unwrap(), 6, "delete");
    assert_eq!(store.count().await.unwrap(), 0);
}

/// Every field survives the trip through the backend
pub async fn check_round_trip(store: &dyn PatientStore) {
    fresh(store).await;
    let record = PatientRecord {
        patient_id: 999,
        sex: 1,
        age: 7.5,
        education: 6,
        income: 123_456,
        gen_health: 2,
        ment_health_days: 30,
        phys_health_days: 14,
        difficulty_walking: true,
        physical_activity: false,
        smoker: true,
        fruits: false,
        veggies: true,
        heart_disease: true,
        stroke: false,
        diabetes: true,
        high_blood_pressure: false,
        high_cholesterol: true,
    };

    let ids = store.insert(vec![record.clone()].into(), 1).await.unwrap();
    assert_eq!(ids, vec![1], "input identifiers are ignored");

    let stored = store.get(1).await.unwrap().expect("inserted patient missing");
    assert_eq!(stored, record.clone().with_id(1));
    assert!(store.get(999).await.unwrap().is_none());
}

/// Aggregates agree with the in-memory reference over the same population
pub async fn check_aggregates_match_reference(store: &dyn PatientStore) {
    fresh(store).await;
    let input: Arc<[PatientRecord]> = synthetic_patients(400, 21).into();
    store.insert(Arc::clone(&input), input.len()).await.unwrap();
    let stored = store.read(input.len()).await.unwrap();

    for limit in [1, 3, 100] {
        assert_groups_match(
            &store.aggregate_variant_1(limit).await.unwrap(),
            &expected_variant_1(&stored, limit),
            "aggregate_variant_1",
        );
        assert_groups_match(
            &store.aggregate_variant_2(limit).await.unwrap(),
            &expected_variant_2(&stored, limit),
            "aggregate_variant_2",
        );
    }

    let groups = store.aggregate_variant_2(100).await.unwrap();
    assert!(!groups.is_empty(), "population should produce qualifying groups");
    for g in &groups {
        assert!(g.patient_count > 5);
        assert!(g.average_income > 50_000.0);
    }
    for pair in groups.windows(2) {
        assert!(pair[0].average_income >= pair[1].average_income);
    }
}

/// Reset empties the store and restarts identifiers
pub async fn check_reset(store: &dyn PatientStore) {
    fresh(store).await;
    store.insert(synthetic_patients(3, 6).into(), 3).await.unwrap();
    store.reset().await.unwrap();

    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(store.insert(synthetic_patients(1, 6).into(), 1).await.unwrap(), vec![1]);
}

fn assert_distinct(ids: &[i64], expected: usize, op: &str) {
    assert_eq!(ids.len(), expected, "{op} touched {} patients", ids.len());
    let unique: HashSet<&i64> = ids.iter().collect();
    assert_eq!(unique.len(), expected, "{op} sampled duplicates: {ids:?}");
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= RELATIVE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Compare group lists allowing float noise in the averages
pub fn assert_groups_match(actual: &[EducationGroup], expected: &[EducationGroup], label: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{label}: got {actual:?}, expected {expected:?}"
    );
    for (a, e) in actual.iter().zip(expected) {
        assert_eq!(a.education, e.education, "{label}: group order {actual:?}");
        assert_eq!(a.patient_count, e.patient_count, "{label}: education {}", e.education);
        assert!(
            approx_eq(a.average_income, e.average_income),
            "{label}: education {} income {} vs {}",
            e.education,
            a.average_income,
            e.average_income
        );
        match (a.average_age, e.average_age) {
            (Some(x), Some(y)) => assert!(approx_eq(x, y), "{label}: age {x} vs {y}"),
            (None, None) => {}
            other => panic!("{label}: average_age presence differs: {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mocks::MockPatientStore;

    #[tokio::test]
    async fn test_mock_store_satisfies_contract() {
        let store = MockPatientStore::new("memory");
        run_contract_suite(&store).await;
    }
}
