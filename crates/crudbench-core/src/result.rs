//! Benchmark results
//!
//! A [`BenchmarkRun`] holds every timed cell of one invocation in execution
//! order. [`BenchmarkRun::columns`] and [`BenchmarkRun::rows`] give the
//! tabular view the sinks write: one row per workload size, one column per
//! backend x operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::operation::OperationKind;

/// Mean duration of one (backend, operation, size) cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub backend: String,
    pub operation: OperationKind,
    pub workload_size: usize,
    pub duration_seconds: f64,
    /// Number of samples averaged into `duration_seconds`
    pub samples: usize,
}

/// A cell that produced no duration because the call failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFailure {
    pub backend: String,
    pub operation: OperationKind,
    pub workload_size: usize,
    pub message: String,
}

impl From<&BackendError> for CellFailure {
    fn from(e: &BackendError) -> Self {
        Self {
            backend: e.backend.clone(),
            operation: e.operation,
            workload_size: e.workload_size,
            message: e.source.to_string(),
        }
    }
}

/// One column of the result table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub backend: String,
    pub operation: OperationKind,
}

impl ResultColumn {
    /// Column header, e.g. `sqlite_insert_avg`
    pub fn header(&self) -> String {
        format!("{}_{}_avg", self.backend, self.operation)
    }
}

/// One row of the result table
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub size: usize,
    /// Aligned with [`BenchmarkRun::columns`]; `None` for failed cells
    pub cells: Vec<Option<f64>>,
}

/// Everything measured by one invocation of the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub started_at: DateTime<Utc>,
    /// Backend names in registration order
    pub backends: Vec<String>,
    /// Workload sizes in execution order
    pub sizes: Vec<usize>,
    pub iterations: usize,
    pub results: Vec<OperationResult>,
    pub failures: Vec<CellFailure>,
}

impl BenchmarkRun {
    /// Columns in backend-registration x operation-execution order
    pub fn columns(&self) -> Vec<ResultColumn> {
        self.backends
            .iter()
            .flat_map(|backend| {
                OperationKind::ALL.iter().map(move |op| ResultColumn {
                    backend: backend.clone(),
                    operation: *op,
                })
            })
            .collect()
    }

    /// Header row: `size` followed by every column header
    pub fn headers(&self) -> Vec<String> {
        std::iter::once("size".to_string())
            .chain(self.columns().iter().map(ResultColumn::header))
            .collect()
    }

    /// One row per workload size, in execution order
    pub fn rows(&self) -> Vec<ResultRow> {
        let columns = self.columns();
        self.sizes
            .iter()
            .map(|&size| ResultRow {
                size,
                cells: columns
                    .iter()
                    .map(|c| self.duration(&c.backend, c.operation, size))
                    .collect(),
            })
            .collect()
    }

    /// Recorded mean for a cell, `None` if it failed or never ran
    pub fn duration(&self, backend: &str, operation: OperationKind, size: usize) -> Option<f64> {
        self.results
            .iter()
            .find(|r| r.backend == backend && r.operation == operation && r.workload_size == size)
            .map(|r| r.duration_seconds)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn run() -> BenchmarkRun {
        let result = |backend: &str, operation, size, secs| OperationResult {
            backend: backend.to_string(),
            operation,
            workload_size: size,
            duration_seconds: secs,
            samples: 1,
        };
        BenchmarkRun {
            started_at: Utc::now(),
            backends: vec!["surrealdb".to_string(), "sqlite".to_string()],
            sizes: vec![10, 100],
            iterations: 1,
            results: vec![
                result("surrealdb", OperationKind::Insert, 10, 0.5),
                result("sqlite", OperationKind::Insert, 10, 0.25),
                result("sqlite", OperationKind::Read, 100, 0.125),
            ],
            failures: vec![],
        }
    }

    #[test]
    fn test_headers_follow_registration_order() {
        let headers = run().headers();
        assert_eq!(headers.len(), 1 + 2 * 6);
        assert_eq!(headers[0], "size");
        assert_eq!(headers[1], "surrealdb_insert_avg");
        assert_eq!(headers[6], "surrealdb_aggregate_variant_2_avg");
        assert_eq!(headers[7], "sqlite_insert_avg");
        assert_eq!(headers[12], "sqlite_aggregate_variant_2_avg");
    }

    #[test]
    fn test_rows_leave_missing_cells_empty() {
        let rows = run().rows();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].size, 10);
        assert_eq!(rows[0].cells[0], Some(0.5));
        assert_eq!(rows[0].cells[1], None);
        assert_eq!(rows[0].cells[6], Some(0.25));

        assert_eq!(rows[1].size, 100);
        assert_eq!(rows[1].cells[7], Some(0.125));
        assert_eq!(rows[1].cells.iter().flatten().count(), 1);
    }

    #[test]
    fn test_cell_failure_from_backend_error() {
        let err = BackendError {
            backend: "surrealdb".to_string(),
            operation: OperationKind::Update,
            workload_size: 10,
            source: StoreError::backend("connection reset"),
        };
        let failure = CellFailure::from(&err);
        assert_eq!(failure.operation, OperationKind::Update);
        assert!(failure.message.contains("connection reset"));
    }
}
