//! Benchmark Runner
//!
//! Drives the six operations against every registered backend, tier by tier,
//! and times each call.
//!
//! ## Phases
//!
//! `Idle -> Loading -> Running(size) ... -> Aggregating -> Done`, one linear
//! pass per invocation. [`BenchmarkRunner::run`] consumes the runner, so the
//! backend handles it owns are dropped when the run ends.
//!
//! ## Ordering
//!
//! For each size (ascending), for each iteration, for each backend (in
//! registration order), the operations run in [`OperationKind::ALL`] order.
//! Nothing overlaps. Inserts accumulate across tiers and iterations unless
//! the backends are reset before the run.
//!
//! ## Timing
//!
//! The clock starts immediately before the driver call and stops as soon as
//! it returns or fails. Every call is wrapped in a timeout; expiry counts as
//! a failure. A failed cell gets no duration, is recorded in
//! [`BenchmarkRun::failures`] and is not attempted again in later iterations
//! of the same tier.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::{BackendError, BenchError, BenchResult, StoreError, StoreResult};
use crate::operation::{OperationKind, WorkloadPlan};
use crate::patient::{PatientRecord, INCOME_DELTA};
use crate::result::{BenchmarkRun, CellFailure, OperationResult};
use crate::source::DataSource;
use crate::store::PatientStore;

/// Default per-call timeout
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Where a backend's insert batches come from
#[derive(Debug, Clone)]
pub enum RecordFeed {
    /// Loaded from a file during the `Loading` phase
    Source(DataSource),
    /// Already in memory
    Records(Vec<PatientRecord>),
}

impl From<DataSource> for RecordFeed {
    fn from(source: DataSource) -> Self {
        Self::Source(source)
    }
}

impl From<Vec<PatientRecord>> for RecordFeed {
    fn from(records: Vec<PatientRecord>) -> Self {
        Self::Records(records)
    }
}

/// Runner state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Loading,
    Running(usize),
    Aggregating,
    Done,
}

impl RunPhase {
    fn rank(&self) -> (u8, usize) {
        match self {
            RunPhase::Idle => (0, 0),
            RunPhase::Loading => (1, 0),
            RunPhase::Running(size) => (2, *size),
            RunPhase::Aggregating => (3, 0),
            RunPhase::Done => (4, 0),
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => f.write_str("idle"),
            RunPhase::Loading => f.write_str("loading"),
            RunPhase::Running(size) => write!(f, "running({})", size),
            RunPhase::Aggregating => f.write_str("aggregating"),
            RunPhase::Done => f.write_str("done"),
        }
    }
}

/// Forward-only phase tracker
#[derive(Debug)]
pub struct PhaseTracker {
    current: RunPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: RunPhase::Idle,
        }
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    /// Move to `next`; anything that is not strictly later is rejected
    pub fn advance(&mut self, next: RunPhase) -> BenchResult<()> {
        if next.rank() <= self.current.rank() {
            return Err(BenchError::PhaseTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %self.current, to = %next, "Runner phase transition");
        self.current = next;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

struct BackendSlot {
    store: Arc<dyn PatientStore>,
    feed: RecordFeed,
}

enum Cell {
    Samples(Vec<Duration>),
    Failed,
}

/// Times the operation set against each backend at each workload size
pub struct BenchmarkRunner {
    plan: WorkloadPlan,
    iterations: usize,
    timeout: Duration,
    reset_before_run: bool,
    backends: Vec<BackendSlot>,
}

impl BenchmarkRunner {
    pub fn new(plan: WorkloadPlan) -> Self {
        Self {
            plan,
            iterations: 1,
            timeout: DEFAULT_OPERATION_TIMEOUT,
            reset_before_run: false,
            backends: Vec::new(),
        }
    }

    /// Builder-style: samples per cell, averaged
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Builder-style: per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style: empty every backend before the first tier
    #[must_use]
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset_before_run = reset;
        self
    }

    /// Builder-style: register a backend with its input feed
    #[must_use]
    pub fn with_backend(
        mut self,
        store: Arc<dyn PatientStore>,
        feed: impl Into<RecordFeed>,
    ) -> Self {
        self.backends.push(BackendSlot {
            store,
            feed: feed.into(),
        });
        self
    }

    /// Execute the whole benchmark
    pub async fn run(self) -> BenchResult<BenchmarkRun> {
        let BenchmarkRunner {
            plan,
            iterations,
            timeout,
            reset_before_run,
            backends,
        } = self;
        let mut phase = PhaseTracker::new();
        let started_at = Utc::now();

        if backends.is_empty() {
            return Err(BenchError::Configuration("no backends registered".to_string()));
        }
        if iterations == 0 {
            return Err(BenchError::Configuration(
                "iterations must be at least 1".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(BenchError::Configuration(
                "operation timeout must be positive".to_string(),
            ));
        }

        phase.advance(RunPhase::Loading)?;
        let mut loaded: Vec<(Arc<dyn PatientStore>, Arc<[PatientRecord]>)> =
            Vec::with_capacity(backends.len());
        for slot in backends {
            let records = match slot.feed {
                RecordFeed::Source(source) => source.load()?.records,
                RecordFeed::Records(records) => records,
            };
            if records.len() < plan.largest() {
                warn!(
                    backend = slot.store.name(),
                    available = records.len(),
                    largest_tier = plan.largest(),
                    "Input has fewer records than the largest tier; inserts will be short"
                );
            }
            loaded.push((slot.store, records.into()));
        }

        if reset_before_run {
            for (store, _) in &loaded {
                info!(backend = store.name(), "Resetting backend state");
                store.reset().await.map_err(|source| BenchError::Store {
                    backend: store.name().to_string(),
                    source,
                })?;
            }
        }

        let backend_names: Vec<String> = loaded.iter().map(|(s, _)| s.name().to_string()).collect();
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for &size in plan.sizes() {
            phase.advance(RunPhase::Running(size))?;
            info!(size, iterations, "Running workload tier");

            let mut cells: HashMap<(usize, OperationKind), Cell> = HashMap::new();
            for iteration in 0..iterations {
                for (index, (store, records)) in loaded.iter().enumerate() {
                    for op in OperationKind::ALL {
                        let cell = cells
                            .entry((index, op))
                            .or_insert_with(|| Cell::Samples(Vec::new()));
                        if matches!(cell, Cell::Failed) {
                            continue;
                        }

                        match time_operation(store.as_ref(), op, size, records, timeout).await {
                            Ok(elapsed) => {
                                debug!(
                                    backend = store.name(),
                                    operation = %op,
                                    size,
                                    iteration,
                                    seconds = elapsed.as_secs_f64(),
                                    "Operation timed"
                                );
                                if let Cell::Samples(samples) = cell {
                                    samples.push(elapsed);
                                }
                            }
                            Err(source) => {
                                let err = BackendError {
                                    backend: store.name().to_string(),
                                    operation: op,
                                    workload_size: size,
                                    source,
                                };
                                error!(
                                    error = %err,
                                    iteration,
                                    timed_out = err.source.is_timeout(),
                                    "Operation failed; cell excluded"
                                );
                                failures.push(CellFailure::from(&err));
                                *cell = Cell::Failed;
                            }
                        }
                    }
                }
            }

            for (index, name) in backend_names.iter().enumerate() {
                for op in OperationKind::ALL {
                    if let Some(Cell::Samples(samples)) = cells.get(&(index, op)) {
                        if samples.is_empty() {
                            continue;
                        }
                        let total: f64 = samples.iter().map(Duration::as_secs_f64).sum();
                        results.push(OperationResult {
                            backend: name.clone(),
                            operation: op,
                            workload_size: size,
                            duration_seconds: total / samples.len() as f64,
                            samples: samples.len(),
                        });
                    }
                }
            }
        }

        phase.advance(RunPhase::Aggregating)?;
        let run = BenchmarkRun {
            started_at,
            backends: backend_names,
            sizes: plan.sizes().to_vec(),
            iterations,
            results,
            failures,
        };
        info!(
            cells = run.results.len(),
            failed = run.failures.len(),
            "Benchmark run complete"
        );

        phase.advance(RunPhase::Done)?;
        drop(loaded);
        Ok(run)
    }
}

/// Time one driver call, timeout included
async fn time_operation(
    store: &dyn PatientStore,
    op: OperationKind,
    size: usize,
    records: &Arc<[PatientRecord]>,
    timeout: Duration,
) -> StoreResult<Duration> {
    let batch = Arc::clone(records);
    let start = Instant::now();
    let outcome = match op {
        OperationKind::Insert => guard(timeout, store.insert(batch, size)).await.map(drop),
        OperationKind::Read => guard(timeout, store.read(size)).await.map(drop),
        OperationKind::Update => guard(timeout, store.update(size, INCOME_DELTA))
            .await
            .map(drop),
        OperationKind::Delete => guard(timeout, store.delete(size)).await.map(drop),
        OperationKind::AggregateVariant1 => {
            guard(timeout, store.aggregate_variant_1(size)).await.map(drop)
        }
        OperationKind::AggregateVariant2 => {
            guard(timeout, store.aggregate_variant_2(size)).await.map(drop)
        }
    };
    let elapsed = start.elapsed();
    outcome.map(|()| elapsed)
}

async fn guard<T>(timeout: Duration, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| StoreError::timeout(timeout))?
}
