//! crudbench command-line interface
//!
//! Library half of the `crudbench` binary so argument parsing and the
//! command wiring can be exercised from tests.

pub mod cli;
pub mod commands;
