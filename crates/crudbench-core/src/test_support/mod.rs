//! Test helpers shared with the driver crates
//!
//! Enabled with the `test-utils` feature.

pub mod contract;
pub mod mocks;

pub use contract::run_contract_suite;
pub use mocks::{MockPatientStore, MockStoreStats};
