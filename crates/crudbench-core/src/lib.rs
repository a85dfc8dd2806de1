//! crudbench core
//!
//! Patient data model, input loading, the [`PatientStore`] contract that
//! backend drivers implement, the benchmark runner and the result sink.
//! Backend drivers live in their own crates so this one stays free of
//! database dependencies.

pub mod error;
pub mod operation;
pub mod patient;
pub mod result;
pub mod runner;
pub mod sink;
pub mod source;
pub mod store;
pub mod synthetic;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use error::{
    BackendError, BenchError, BenchResult, FormatError, SinkError, SinkResult, StoreError,
    StoreResult,
};
pub use operation::{OperationKind, WorkloadPlan, DEFAULT_SIZES};
pub use patient::{
    sort_groups, Demographics, Diseases, EducationGroup, HealthStatus, Lifestyle,
    PatientDocument, PatientRecord, AGGREGATE_INCOME_THRESHOLD, AGGREGATE_MIN_GROUP_SIZE,
    INCOME_DELTA,
};
pub use result::{BenchmarkRun, CellFailure, OperationResult, ResultColumn, ResultRow};
pub use runner::{BenchmarkRunner, PhaseTracker, RecordFeed, RunPhase, DEFAULT_OPERATION_TIMEOUT};
pub use sink::{CsvResultSink, ResultSink};
pub use source::{DataSource, LoadedRecords, MalformedPolicy, SourceFormat};
pub use store::PatientStore;
pub use synthetic::{synthetic_patients, DEFAULT_SEED};
