//! E2E scenario runner
//!
//! Reads YAML test scenarios and drives them through a shared harness,
//! asserting against structured command results and polled chain state
//! rather than fragile string matching.

mod config;
mod runner;

pub use config::*;
pub use runner::{load_scenario, run, run_all, run_scenario, TestResult};
