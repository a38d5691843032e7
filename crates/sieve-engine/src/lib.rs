//! Coverage-instrumented test execution over a pool of working trees.
//!
//! A [`TaskOrchestrator`] borrows one pre-cloned tree from the [`RepoPool`],
//! optionally writes a [`PatchScope`] into it, runs the test framework with a
//! selection built by [`SelectionCommandBuilder`] and returns the parsed
//! coverage report. Trees and patches are released on every exit path.

mod artifact;
/// Interpreter and package probing.
pub mod dependency;
pub mod fingerprint;
/// Task lifecycle.
pub mod orchestrator;
/// Scoped file replacement inside a working tree.
pub mod patch;
/// Working tree pool.
pub mod pool;
pub mod selection;

pub use dependency::DependencyChecker;
pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use orchestrator::TaskOrchestrator;
pub use patch::PatchScope;
pub use pool::{RepoPool, SlotGuard};
pub use selection::{SelectionCommand, SelectionCommandBuilder};
