use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Instant;

use sieve_core::{
    EngineConfig, Error, ExecutionFailure, FailureKind, Result, Task, TaskPhase, TaskResult,
};
use tokio::process::Command;
use tokio::task::spawn_blocking;
use tokio::time::timeout;

use crate::artifact::{clear_stale, read_coverage};
use crate::dependency::DependencyChecker;
use crate::fingerprint::{Fingerprint, FingerprintHasher};
use crate::patch::PatchScope;
use crate::pool::{RepoPool, SlotGuard};
use crate::selection::{SelectionCommand, SelectionCommandBuilder};

/// Runs tasks against working trees borrowed from a shared pool.
///
/// Share one orchestrator across callers with an `Arc`; each call to
/// [`TaskOrchestrator::run`] holds exactly one working tree for its duration.
#[derive(Debug)]
pub struct TaskOrchestrator {
    config: EngineConfig,
    pool: Arc<RepoPool>,
    builder: SelectionCommandBuilder,
}

impl TaskOrchestrator {
    /// Validate `config`, build the pool and probe the interpreter.
    ///
    /// # Errors
    /// Returns a construction error if the configuration is invalid, a working
    /// tree is missing, no trees are configured, the interpreter does not exist
    /// or required packages are not importable.
    pub async fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = RepoPool::new(config.working_trees.clone())?;

        let checker = DependencyChecker::new(&config.interpreter, config.python_path.clone())?;
        checker.ensure(&config.required_packages).await?;

        tracing::info!(
            "Engine ready: {} working trees, interpreter {}",
            pool.capacity(),
            checker.interpreter().display()
        );
        Ok(Self::with_pool(config, pool))
    }

    /// Assemble an orchestrator over an existing pool without probing the interpreter.
    #[must_use]
    pub fn with_pool(config: EngineConfig, pool: Arc<RepoPool>) -> Self {
        let builder = SelectionCommandBuilder::new(&config);
        Self {
            config,
            pool,
            builder,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared working tree pool.
    pub fn pool(&self) -> &Arc<RepoPool> {
        &self.pool
    }

    /// Idle working trees right now. For observability only.
    pub fn available_slots(&self) -> usize {
        self.pool.len()
    }

    /// Run `task` once in a borrowed working tree.
    ///
    /// Success is decided by the coverage artifact, not the exit code: a run
    /// that leaves a non-empty report succeeds even if some tests failed or
    /// could not be collected.
    ///
    /// # Errors
    /// Returns `Error::Execution` when the process could not run or left no
    /// usable coverage, `Error::AcquireTimeout` when no tree freed up in time,
    /// and `Error::Patch` when the patch could not be applied.
    pub async fn run(&self, task: &Task) -> Result<TaskResult> {
        trace_phase(TaskPhase::Idle, None);
        let slot = self.acquire_slot().await?;
        let root = slot.path().to_path_buf();
        trace_phase(TaskPhase::SlotAcquired, Some(&root));
        tracing::info!("Task started on {}", root.display());

        let start = Instant::now();
        let outcome = self.run_in_slot(task, &root).await;

        trace_phase(
            if outcome.is_ok() {
                TaskPhase::Succeeded
            } else {
                TaskPhase::Failed
            },
            Some(&root),
        );
        drop(slot);
        trace_phase(TaskPhase::Released, Some(&root));

        tracing::info!(
            "Task finished in {}ms on {}: {}",
            start.elapsed().as_millis(),
            root.display(),
            if outcome.is_ok() { "succeeded" } else { "failed" }
        );
        outcome
    }

    /// Fingerprint `directory` together with the command `task` would run.
    ///
    /// The command is rendered without its working directory so the result
    /// does not depend on which tree a later run lands in.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub async fn fingerprint(
        &self,
        task: &Task,
        directory: &Path,
        extensions: &[&str],
    ) -> Result<Fingerprint> {
        let invocation = self.builder.build(task, directory).invocation();
        let hasher = FingerprintHasher::new(extensions);
        let directory = directory.to_path_buf();

        spawn_blocking(move || hasher.hash(&directory, &invocation))
            .await
            .map_err(|err| Error::Internal(format!("fingerprint worker failed: {err}")))?
    }

    async fn acquire_slot(&self) -> Result<SlotGuard> {
        match self.config.acquire_timeout() {
            Some(limit) => self.pool.acquire_timeout(limit).await,
            None => self.pool.acquire().await,
        }
    }

    // A revert failure outranks the run's own outcome: the tree is dirty.
    // Cancellation skips the explicit revert, and `PatchScope::drop` restores
    // the file before `run` hands the slot back.
    async fn run_in_slot(&self, task: &Task, root: &Path) -> Result<TaskResult> {
        let scope = match task.patch() {
            Some(patch) => {
                let scope = PatchScope::apply(root, self.config.project_root.as_deref(), patch)?;
                trace_phase(TaskPhase::PatchApplied, Some(root));
                Some(scope)
            }
            None => None,
        };

        let outcome = self.run_command(task, root).await;

        if let Some(scope) = scope
            && let Err(error) = scope.revert()
        {
            tracing::warn!(
                "Working tree {} is dirty, patch could not be reverted: {error}",
                root.display()
            );
            return Err(error);
        }
        outcome
    }

    async fn run_command(&self, task: &Task, root: &Path) -> Result<TaskResult> {
        let command = self.builder.build(task, root);
        let context = RunContext {
            slot: root.to_path_buf(),
            command: command.to_shell_string(),
        };
        trace_phase(TaskPhase::CommandBuilt, Some(root));
        tracing::debug!("Running {}", context.command);

        let artifact = root.join(&self.config.coverage_artifact);
        clear_stale(&artifact).await.map_err(|err| {
            context.failure(
                FailureKind::StaleArtifact(err.to_string()),
                TaskPhase::CommandBuilt,
                None,
            )
        })?;

        trace_phase(TaskPhase::ProcessRunning, Some(root));
        let start = Instant::now();
        let output = self.execute(&command, &context).await?;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let coverage = match read_coverage(&artifact).await {
            Ok(coverage) => coverage,
            Err(kind) => {
                trace_phase(TaskPhase::ArtifactMissing, Some(root));
                return Err(context.failure(kind, TaskPhase::ArtifactMissing, Some(&output)));
            }
        };
        trace_phase(TaskPhase::ArtifactRead, Some(root));

        Ok(TaskResult {
            coverage,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            slot: context.slot,
            command: context.command,
            duration_ms,
        })
    }

    async fn execute(&self, command: &SelectionCommand, context: &RunContext) -> Result<Output> {
        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(python_path) = &self.config.python_path {
            process.env("PYTHONPATH", python_path);
        }

        let output = match self.config.process_timeout() {
            Some(limit) => match timeout(limit, process.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return Err(context.failure(
                        FailureKind::TimedOut {
                            secs: limit.as_secs(),
                        },
                        TaskPhase::ProcessRunning,
                        None,
                    ));
                }
            },
            None => process.output().await,
        };

        output.map_err(|err| {
            context.failure(
                FailureKind::SpawnFailed(err.to_string()),
                TaskPhase::ProcessRunning,
                None,
            )
        })
    }
}

/// Diagnostic context shared by every failure of one run.
struct RunContext {
    slot: PathBuf,
    command: String,
}

impl RunContext {
    fn failure(&self, kind: FailureKind, phase: TaskPhase, output: Option<&Output>) -> Error {
        let (stdout, stderr, exit_code) = output.map_or_else(
            || (String::new(), String::new(), None),
            |output| {
                (
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                    output.status.code(),
                )
            },
        );
        ExecutionFailure {
            kind,
            phase,
            slot: self.slot.clone(),
            command: self.command.clone(),
            stdout,
            stderr,
            exit_code,
        }
        .into()
    }
}

fn trace_phase(phase: TaskPhase, slot: Option<&Path>) {
    match slot {
        Some(path) => tracing::debug!("Task phase {phase:?} on {}", path.display()),
        None => tracing::debug!("Task phase {phase:?}"),
    }
}
