//! Config file loading and the full precedence chain

use std::path::PathBuf;

use crudbench_config::{
    BenchConfig, ConfigError, Overrides, ENV_ITERATIONS, ENV_SURREAL_ENDPOINT,
};
use serial_test::serial;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("crudbench.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_full_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[workload]
sizes = [10, 100]
iterations = 3
operation_timeout_secs = 60
reset_before_run = true

[data]
tabular_path = "patients.csv"
synthetic_count = 500
synthetic_seed = 7

[sqlite]
path = "bench.db"
wal_mode = false
foreign_keys = true
busy_timeout_ms = 1000

[surrealdb]
endpoint = "ws://localhost:8000"
namespace = "bench"
database = "patients"
username = "root"
password = "root"

[output]
directory = "results"
file_prefix = "run"
"#,
    );

    let config = BenchConfig::from_file(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(config.workload.sizes, vec![10, 100]);
    assert_eq!(config.workload.iterations, 3);
    assert!(config.workload.reset_before_run);
    assert_eq!(config.data.tabular_path, Some(PathBuf::from("patients.csv")));
    assert_eq!(config.data.hierarchical_path, None);
    assert!(!config.sqlite.wal_mode);
    assert_eq!(config.surrealdb.username.as_deref(), Some("root"));
    assert_eq!(config.output.file_prefix, "run");
}

#[test]
fn test_rendered_toml_parses_back() {
    let mut config = BenchConfig::default();
    config.data.tabular_path = Some(PathBuf::from("in.csv"));
    config.workload.sizes = vec![1, 2, 3];

    let text = config.to_toml().unwrap();
    let parsed = BenchConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = BenchConfig::from_file_or_default(Some(&dir.path().join("absent.toml")))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_malformed_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[workload]\nsizes = \"ten\"\n");

    let err = BenchConfig::from_file(&path).unwrap_err();
    match err {
        ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_precedence_defaults_file_env_flags() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[workload]
iterations = 2

[surrealdb]
endpoint = "ws://file:8000"

[output]
directory = "from-file"
"#,
    );

    std::env::set_var(ENV_ITERATIONS, "5");
    std::env::set_var(ENV_SURREAL_ENDPOINT, "ws://env:8000");

    let overrides = Overrides {
        iterations: Some(9),
        ..Overrides::default()
    };
    let result = BenchConfig::load(Some(&path), &overrides);

    std::env::remove_var(ENV_ITERATIONS);
    std::env::remove_var(ENV_SURREAL_ENDPOINT);

    let config = result.unwrap();
    assert_eq!(config.workload.iterations, 9, "flag beats env");
    assert_eq!(config.surrealdb.endpoint, "ws://env:8000", "env beats file");
    assert_eq!(config.output.directory, PathBuf::from("from-file"), "file beats default");
    assert_eq!(config.workload.sizes, vec![10, 100, 1_000, 10_000]);
}

#[test]
#[serial]
fn test_load_rejects_invalid_result() {
    let overrides = Overrides {
        sizes: Some(vec![100, 10]),
        ..Overrides::default()
    };
    let err = BenchConfig::load(None, &overrides).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}
