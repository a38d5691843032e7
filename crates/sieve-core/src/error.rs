use core::result::Result as CoreResult;
use std::fmt;
use std::io::Error as IoError;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

use crate::types::TaskPhase;

/// Result type for engine operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors produced while constructing or driving the test engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A configured working tree does not exist on disk.
    #[error("Working tree does not exist: {}", path.display())]
    MissingWorkingTree {
        /// Path that failed the existence check
        path: PathBuf,
    },

    /// The pool was configured with zero working trees.
    #[error("Pool constructed with zero working trees")]
    PoolExhausted,

    /// The interpreter used to run tests could not be found.
    #[error("Interpreter not found: {}", path.display())]
    InterpreterNotFound {
        /// Interpreter path as configured
        path: PathBuf,
    },

    /// Packages required by the test framework are not importable.
    #[error("Interpreter {} is missing required packages: {}", interpreter.display(), packages.join(", "))]
    MissingPackages {
        /// Interpreter that was probed
        interpreter: PathBuf,
        /// Package names that failed to import
        packages: Vec<String>,
    },

    /// A task ran but did not produce usable coverage.
    #[error("{0}")]
    Execution(Box<ExecutionFailure>),

    /// No slot became free within the configured wait.
    #[error("Timed out after {waited_ms}ms waiting for a working tree")]
    AcquireTimeout {
        /// How long the caller waited
        waited_ms: u64,
    },

    /// A patch could not be applied to a working tree.
    #[error("Failed to patch {}: {reason}", path.display())]
    Patch {
        /// Patch target
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An engine invariant was broken; indicates a bug rather than bad input.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error was raised while building the engine.
    ///
    /// Construction errors indicate misconfiguration and must never be retried.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::MissingWorkingTree { .. }
                | Self::PoolExhausted
                | Self::InterpreterNotFound { .. }
                | Self::MissingPackages { .. }
        )
    }

    /// Whether the caller may reasonably submit the same task again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution(_) | Self::AcquireTimeout { .. })
    }

    /// The execution failure carried by this error, if any.
    pub fn as_execution(&self) -> Option<&ExecutionFailure> {
        match self {
            Self::Execution(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ExecutionFailure> for Error {
    fn from(failure: ExecutionFailure) -> Self {
        Self::Execution(Box::new(failure))
    }
}

/// Why a task failed after its working tree was acquired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The test framework process could not be started.
    SpawnFailed(String),
    /// The process did not finish in time and was killed.
    TimedOut {
        /// Configured limit
        secs: u64,
    },
    /// No coverage artifact was written.
    ArtifactMissing,
    /// The artifact exists but is not a valid coverage report.
    ArtifactUnreadable(String),
    /// The artifact parsed but covers no files.
    ArtifactEmpty,
    /// A report left by an earlier run could not be removed before spawning.
    StaleArtifact(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed(reason) => write!(formatter, "failed to spawn test process: {reason}"),
            Self::TimedOut { secs } => write!(formatter, "test process timed out after {secs}s"),
            Self::ArtifactMissing => formatter.write_str("coverage artifact missing"),
            Self::ArtifactUnreadable(reason) => {
                write!(formatter, "coverage artifact unreadable: {reason}")
            }
            Self::ArtifactEmpty => formatter.write_str("coverage artifact is empty"),
            Self::StaleArtifact(reason) => {
                write!(formatter, "stale coverage artifact could not be removed: {reason}")
            }
        }
    }
}

/// Diagnostic context for a failed task, sufficient to reproduce it by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Failure classification
    pub kind: FailureKind,
    /// State the task was in when it failed
    pub phase: TaskPhase,
    /// Working tree the task ran in
    pub slot: PathBuf,
    /// Full command, including the change of directory
    pub command: String,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit code, when the process ran to completion
    pub exit_code: Option<i32>,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "Task failed during {:?}: {}\n  slot: {}\n  command: {}",
            self.phase,
            self.kind,
            self.slot.display(),
            self.command
        )?;
        if let Some(code) = self.exit_code {
            write!(formatter, "\n  exit code: {code}")?;
        }
        if !self.stderr.trim().is_empty() {
            write!(formatter, "\n  stderr:\n{}", self.stderr.trim_end())?;
        }
        Ok(())
    }
}
