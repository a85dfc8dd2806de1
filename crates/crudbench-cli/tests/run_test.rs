//! End-to-end runs against in-memory backends

use std::path::PathBuf;

use crudbench_cli::cli::BackendChoice;
use crudbench_cli::commands::run;
use crudbench_config::BenchConfig;
use tempfile::TempDir;

fn memory_config(output: &TempDir) -> BenchConfig {
    let mut config = BenchConfig::default();
    config.workload.sizes = vec![5, 10];
    config.data.synthetic_count = 20;
    config.sqlite.path = PathBuf::from(":memory:");
    config.surrealdb.endpoint = "mem://".to_string();
    config.output.directory = output.path().to_path_buf();
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_run_writes_table_for_both_backends() {
    let dir = TempDir::new().unwrap();
    let path = run::execute(memory_config(&dir), BackendChoice::Both)
        .await
        .unwrap();

    assert!(path.starts_with(dir.path()));
    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("size,sqlite_insert_avg"));
    assert!(lines[0].contains("surrealdb_aggregate_variant_2_avg"));
    assert!(lines[1].starts_with("5,"));
    assert!(lines[2].starts_with("10,"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_backend_run() {
    let dir = TempDir::new().unwrap();
    let path = run::execute(memory_config(&dir), BackendChoice::Sqlite)
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let header = contents.lines().next().unwrap();
    assert!(header.contains("sqlite_delete_avg"));
    assert!(!header.contains("surrealdb"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_input_file_aborts_run() {
    let dir = TempDir::new().unwrap();
    let mut config = memory_config(&dir);
    config.data.tabular_path = Some(dir.path().join("absent.csv"));

    let err = run::execute(config, BackendChoice::Sqlite).await.unwrap_err();
    assert!(format!("{:#}", err).contains("absent.csv"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
