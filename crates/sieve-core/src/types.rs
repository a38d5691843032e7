use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coverage::CoverageReport;

/// States a task passes through while it holds a working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPhase {
    /// Submitted, waiting for a working tree
    Idle,
    /// Holding a working tree
    SlotAcquired,
    /// Patch written into the working tree
    PatchApplied,
    /// Test command constructed
    CommandBuilt,
    /// Test framework process running
    ProcessRunning,
    /// Coverage artifact parsed
    ArtifactRead,
    /// Coverage artifact absent or unusable
    ArtifactMissing,
    /// Task produced a result
    Succeeded,
    /// Task produced a failure
    Failed,
    /// Working tree handed back to the pool
    Released,
}

/// Full replacement content for one file in a working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Target file, relative to the working tree root
    pub path: PathBuf,
    /// New file content
    pub content: String,
}

impl Patch {
    /// Create a patch replacing `path` with `content`.
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// How a test is declared in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TestKind {
    /// A method on a test class, named `Class.method`
    Method,
    /// A free test function
    Function,
}

/// A test to deselect, together with the file that declares it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExcludedTest {
    /// Test identifier (`Class.method` for methods, `function` for functions)
    pub name: String,
    /// File declaring the test
    pub declaring_file: PathBuf,
    /// Declaration style
    pub kind: TestKind,
}

impl ExcludedTest {
    /// Exclude a method-style test such as `TestClass.test_foo`.
    pub fn method(name: impl Into<String>, declaring_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            declaring_file: declaring_file.into(),
            kind: TestKind::Method,
        }
    }

    /// Exclude a function-style test.
    pub fn function(name: impl Into<String>, declaring_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            declaring_file: declaring_file.into(),
            kind: TestKind::Function,
        }
    }
}

/// One request to run a selection of tests, optionally against patched sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    patch: Option<Patch>,
    include: Vec<String>,
    exclude: BTreeSet<ExcludedTest>,
}

impl Task {
    /// Create an empty task: no patch, no include filter, nothing deselected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword every selected test must match. Duplicates are ignored.
    #[must_use]
    pub fn include(mut self, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        if !self.include.contains(&identifier) {
            self.include.push(identifier);
        }
        self
    }

    /// Add several include keywords, keeping first-occurrence order.
    #[must_use]
    pub fn include_all<I, S>(self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        identifiers
            .into_iter()
            .fold(self, |task, identifier| task.include(identifier))
    }

    /// Deselect a test.
    #[must_use]
    pub fn exclude(mut self, test: ExcludedTest) -> Self {
        self.exclude.insert(test);
        self
    }

    /// Apply `patch` to the working tree for the duration of the run.
    #[must_use]
    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Patch to apply, if any.
    pub fn patch(&self) -> Option<&Patch> {
        self.patch.as_ref()
    }

    /// Include keywords in submission order.
    pub fn included(&self) -> &[String] {
        &self.include
    }

    /// Deselected tests in a stable order.
    pub fn excluded(&self) -> &BTreeSet<ExcludedTest> {
        &self.exclude
    }
}

/// Successful outcome of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Parsed coverage artifact, guaranteed non-empty
    pub coverage: CoverageReport,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Process exit code; informational only
    pub exit_code: Option<i32>,
    /// Working tree the task ran in
    pub slot: PathBuf,
    /// Command that produced the result
    pub command: String,
    /// Wall-clock duration of the process in milliseconds
    pub duration_ms: u64,
}

impl TaskResult {
    /// Working tree the task ran in.
    pub fn slot(&self) -> &Path {
        &self.slot
    }
}
