//! Verification harness for sostdio.
//!
//! This crate provides:
//! - Scenarios: end-to-end stream properties checked against real files and
//!   subprocesses
//! - Structured logging: the JSONL record every scenario run produces, and
//!   a validator for it

#![forbid(unsafe_code)]

pub mod scenarios;
pub mod structured_log;

pub use scenarios::{Scenario, ScenarioError, ScenarioResult, run_all};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
