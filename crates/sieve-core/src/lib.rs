//! Core types for the sieve test engine.
//!
//! This crate provides the configuration, error taxonomy, task description and
//! coverage report model shared by the engine and its front ends.

/// Engine configuration.
pub mod config;
/// Coverage report model.
pub mod coverage;
/// Error types and result definitions.
pub mod error;
/// Task, patch and result types.
pub mod types;

pub use config::EngineConfig;
pub use coverage::{CoverageMeta, CoverageReport, CoverageSummary, FileCoverage};
pub use error::{Error, ExecutionFailure, FailureKind, Result};
pub use types::{ExcludedTest, Patch, Task, TaskPhase, TaskResult, TestKind};
