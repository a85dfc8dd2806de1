//! PatientStore contract against SQLite

use crudbench_core::test_support::contract;
use crudbench_core::{synthetic_patients, PatientStore};
use crudbench_sqlite::{open_store, SqliteConfig, SqlitePatientStore};
use tempfile::TempDir;

fn memory_store() -> SqlitePatientStore {
    open_store(SqliteConfig::memory()).expect("Failed to open in-memory store")
}

#[tokio::test]
async fn test_full_contract_in_memory() {
    contract::run_contract_suite(&memory_store()).await;
}

#[tokio::test]
async fn test_crud_scenario_on_file_database() {
    let dir = TempDir::new().unwrap();
    let store = open_store(SqliteConfig::new(dir.path().join("bench.db"))).unwrap();

    contract::check_crud_scenario(&store).await;
    assert!(store.table_counts().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_aggregates_match_reference() {
    contract::check_aggregates_match_reference(&memory_store()).await;
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.db");

    {
        let store = open_store(SqliteConfig::new(&path)).unwrap();
        store.insert(synthetic_patients(8, 1).into(), 8).await.unwrap();
    }

    let store = open_store(SqliteConfig::new(&path)).unwrap();
    assert_eq!(store.count().await.unwrap(), 8);
    assert_eq!(store.insert(synthetic_patients(1, 2).into(), 1).await.unwrap(), vec![9]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runs_on_multi_thread_runtime() {
    contract::check_oversized_requests(&memory_store()).await;
}

#[tokio::test]
async fn test_deleted_ids_leave_no_dependent_rows() {
    let store = memory_store();
    let inserted = store.insert(synthetic_patients(30, 4).into(), 30).await.unwrap();

    let deleted = store.delete(10).await.unwrap();
    assert_eq!(deleted.len(), 10);
    assert_eq!(store.dependent_row_count(&deleted).await.unwrap(), 0);

    let kept: Vec<i64> = inserted.into_iter().filter(|id| !deleted.contains(id)).collect();
    assert_eq!(store.dependent_row_count(&kept).await.unwrap(), 60);
}
