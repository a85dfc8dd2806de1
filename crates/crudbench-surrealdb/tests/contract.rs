//! PatientStore contract against an in-memory SurrealDB

use crudbench_core::test_support::contract;
use crudbench_core::{synthetic_patients, PatientStore, INCOME_DELTA};
use crudbench_surrealdb::{open_store, SurrealDbConfig, SurrealPatientStore};

async fn memory_store() -> SurrealPatientStore {
    open_store(SurrealDbConfig::memory())
        .await
        .expect("Failed to open in-memory store")
}

#[tokio::test]
async fn test_full_contract() {
    contract::run_contract_suite(&memory_store().await).await;
}

#[tokio::test]
async fn test_aggregates_match_reference() {
    contract::check_aggregates_match_reference(&memory_store().await).await;
}

#[tokio::test]
async fn test_update_changes_nested_income_only() {
    let store = memory_store().await;
    store.insert(synthetic_patients(4, 8).into(), 4).await.unwrap();
    let before = store.read(4).await.unwrap();

    let updated = store.update(4, INCOME_DELTA).await.unwrap();
    assert_eq!(updated.len(), 4);

    for (b, a) in before.iter().zip(store.read(4).await.unwrap()) {
        assert_eq!(a.income, b.income + INCOME_DELTA);
        assert_eq!(a.age, b.age);
        assert_eq!(a.smoker, b.smoker);
    }
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let first = open_store(SurrealDbConfig {
        namespace: "first".to_string(),
        ..SurrealDbConfig::default()
    })
    .await
    .unwrap();
    let second = memory_store().await;

    first.insert(synthetic_patients(3, 1).into(), 3).await.unwrap();
    assert_eq!(first.count().await.unwrap(), 3);
    assert_eq!(second.count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runs_on_multi_thread_runtime() {
    contract::check_crud_scenario(&memory_store().await).await;
}
