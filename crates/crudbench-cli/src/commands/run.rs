use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crudbench_config::BenchConfig;
use crudbench_core::{
    synthetic_patients, BenchmarkRun, BenchmarkRunner, CsvResultSink, DataSource, PatientRecord,
    RecordFeed, ResultSink, WorkloadPlan,
};
use crudbench_sqlite::SqliteConfig;
use crudbench_surrealdb::SurrealDbConfig;

use crate::cli::BackendChoice;

/// Run the benchmark, print the summary and return the written CSV path
pub async fn execute(config: BenchConfig, backend: BackendChoice) -> Result<PathBuf> {
    let plan = WorkloadPlan::new(config.workload.sizes.clone())?;
    let mut runner = BenchmarkRunner::new(plan)
        .with_iterations(config.workload.iterations)
        .with_timeout(Duration::from_secs(config.workload.operation_timeout_secs))
        .with_reset(config.workload.reset_before_run);

    let mut feeds = FeedBuilder::new(&config);

    if backend.includes_sqlite() {
        let store = crudbench_sqlite::open_store(sqlite_config(&config))
            .with_context(|| format!("Failed to open SQLite at {}", config.sqlite.path.display()))?;
        runner = runner.with_backend(Arc::new(store), feeds.tabular());
    }

    if backend.includes_surrealdb() {
        let store = crudbench_surrealdb::open_store(surreal_config(&config))
            .await
            .with_context(|| format!("Failed to open SurrealDB at {}", config.surrealdb.endpoint))?;
        runner = runner.with_backend(Arc::new(store), feeds.hierarchical());
    }

    let run = runner.run().await?;

    let sink = CsvResultSink::new(&config.output.directory).with_prefix(&config.output.file_prefix);
    let path = sink
        .persist(&run)
        .with_context(|| format!("Failed to write results to {}", config.output.directory.display()))?;

    println!("{}", summary_table(&run));
    if run.has_failures() {
        println!("{}", failure_table(&run));
    }
    println!("Results written to {}", path.display());
    info!(sink = sink.name(), path = %path.display(), failures = run.failures.len(), "Benchmark finished");

    Ok(path)
}

/// Relational driver settings from the `[sqlite]` section
pub fn sqlite_config(config: &BenchConfig) -> SqliteConfig {
    SqliteConfig::new(&config.sqlite.path)
        .with_wal_mode(config.sqlite.wal_mode)
        .with_foreign_keys(config.sqlite.foreign_keys)
        .with_busy_timeout_ms(config.sqlite.busy_timeout_ms)
}

/// Document driver settings from the `[surrealdb]` section
pub fn surreal_config(config: &BenchConfig) -> SurrealDbConfig {
    SurrealDbConfig {
        endpoint: config.surrealdb.endpoint.clone(),
        namespace: config.surrealdb.namespace.clone(),
        database: config.surrealdb.database.clone(),
        username: config.surrealdb.username.clone(),
        password: config.surrealdb.password.clone(),
        ..SurrealDbConfig::default()
    }
}

/// Picks each backend's input, generating the synthetic population at most once
pub struct FeedBuilder<'a> {
    config: &'a BenchConfig,
    synthetic: Option<Vec<PatientRecord>>,
}

impl<'a> FeedBuilder<'a> {
    pub fn new(config: &'a BenchConfig) -> Self {
        Self {
            config,
            synthetic: None,
        }
    }

    /// CSV input when configured, synthetic otherwise
    pub fn tabular(&mut self) -> RecordFeed {
        match &self.config.data.tabular_path {
            Some(path) => DataSource::tabular(path).into(),
            None => self.synthetic("tabular"),
        }
    }

    /// JSON input when configured, synthetic otherwise
    pub fn hierarchical(&mut self) -> RecordFeed {
        match &self.config.data.hierarchical_path {
            Some(path) => DataSource::hierarchical(path).into(),
            None => self.synthetic("hierarchical"),
        }
    }

    fn synthetic(&mut self, missing: &str) -> RecordFeed {
        let count = self.config.synthetic_population();
        let seed = self.config.data.synthetic_seed;
        let records = self.synthetic.get_or_insert_with(|| {
            warn!(input = missing, count, seed, "No input file, generating synthetic patients");
            synthetic_patients(count, seed)
        });
        records.clone().into()
    }
}

/// Mean seconds per cell, one row per workload size
pub fn summary_table(run: &BenchmarkRun) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(run.headers());

    for row in run.rows() {
        let mut cells = vec![Cell::new(row.size)];
        cells.extend(row.cells.iter().map(|cell| match cell {
            Some(seconds) => Cell::new(format!("{:.6}", seconds)),
            None => Cell::new("failed").fg(Color::Red),
        }));
        table.add_row(cells);
    }
    table
}

/// Cells that produced no duration, with the reason
pub fn failure_table(run: &BenchmarkRun) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Backend", "Operation", "Size", "Error"]);

    for failure in &run.failures {
        table.add_row(vec![
            Cell::new(&failure.backend),
            Cell::new(failure.operation),
            Cell::new(failure.workload_size),
            Cell::new(&failure.message).fg(Color::Red),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudbench_core::{CellFailure, OperationKind, OperationResult};

    fn sample_run() -> BenchmarkRun {
        BenchmarkRun {
            started_at: Default::default(),
            backends: vec!["sqlite".to_string()],
            sizes: vec![10],
            iterations: 1,
            results: vec![OperationResult {
                backend: "sqlite".to_string(),
                operation: OperationKind::Insert,
                workload_size: 10,
                duration_seconds: 0.25,
                samples: 1,
            }],
            failures: vec![CellFailure {
                backend: "sqlite".to_string(),
                operation: OperationKind::Read,
                workload_size: 10,
                message: "disk I/O error".to_string(),
            }],
        }
    }

    #[test]
    fn test_summary_marks_failed_cells() {
        let rendered = summary_table(&sample_run()).to_string();
        assert!(rendered.contains("sqlite_insert_avg"));
        assert!(rendered.contains("0.250000"));
        assert!(rendered.contains("failed"));
    }

    #[test]
    fn test_failure_table_lists_reason() {
        let rendered = failure_table(&sample_run()).to_string();
        assert!(rendered.contains("read"));
        assert!(rendered.contains("disk I/O error"));
    }

    #[test]
    fn test_missing_inputs_share_one_synthetic_population() {
        let mut config = BenchConfig::default();
        config.workload.sizes = vec![5, 50];
        config.data.synthetic_count = 10;

        let mut feeds = FeedBuilder::new(&config);
        let (RecordFeed::Records(a), RecordFeed::Records(b)) = (feeds.tabular(), feeds.hierarchical())
        else {
            panic!("expected synthetic feeds");
        };
        assert_eq!(a.len(), 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_configured_input_wins() {
        let mut config = BenchConfig::default();
        config.data.tabular_path = Some(PathBuf::from("patients.csv"));

        let mut feeds = FeedBuilder::new(&config);
        assert!(matches!(feeds.tabular(), RecordFeed::Source(_)));
        assert!(matches!(feeds.hierarchical(), RecordFeed::Records(_)));
    }

    #[test]
    fn test_backend_configs_follow_sections() {
        let mut config = BenchConfig::default();
        config.sqlite.path = PathBuf::from(":memory:");
        config.sqlite.busy_timeout_ms = 1234;
        config.surrealdb.endpoint = "ws://db:8000".to_string();

        let sqlite = sqlite_config(&config);
        assert!(sqlite.is_memory());
        assert_eq!(sqlite.busy_timeout_ms, 1234);

        let surreal = surreal_config(&config);
        assert_eq!(surreal.endpoint, "ws://db:8000");
        assert_eq!(surreal.namespace, config.surrealdb.namespace);
    }
}
