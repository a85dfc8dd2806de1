//! Operation kinds and workload tiers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// One of the six timed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Read,
    Update,
    Delete,
    #[serde(rename = "aggregate_variant_1")]
    AggregateVariant1,
    #[serde(rename = "aggregate_variant_2")]
    AggregateVariant2,
}

impl OperationKind {
    /// Every operation, in execution order
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Insert,
        OperationKind::Read,
        OperationKind::Update,
        OperationKind::Delete,
        OperationKind::AggregateVariant1,
        OperationKind::AggregateVariant2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::AggregateVariant1 => "aggregate_variant_1",
            OperationKind::AggregateVariant2 => "aggregate_variant_2",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default workload tiers
pub const DEFAULT_SIZES: [usize; 4] = [10, 100, 1_000, 10_000];

/// Ascending sequence of record counts, one benchmark tier each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadPlan {
    sizes: Vec<usize>,
}

impl WorkloadPlan {
    /// Build a plan; sizes must be non-empty, non-zero and strictly ascending
    pub fn new(sizes: Vec<usize>) -> BenchResult<Self> {
        if sizes.is_empty() {
            return Err(BenchError::Configuration(
                "workload plan has no sizes".to_string(),
            ));
        }
        if sizes.contains(&0) {
            return Err(BenchError::Configuration(
                "workload sizes must be positive".to_string(),
            ));
        }
        if sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BenchError::Configuration(format!(
                "workload sizes must be strictly ascending, got {:?}",
                sizes
            )));
        }
        Ok(Self { sizes })
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Largest tier; inputs need at least this many records
    pub fn largest(&self) -> usize {
        self.sizes.last().copied().unwrap_or(0)
    }
}

impl Default for WorkloadPlan {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_SIZES.to_vec(),
        }
    }
}
