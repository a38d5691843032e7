//! Command handlers for CLI operations

use std::io::stderr;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use serde_json::{json, to_string_pretty};
use sieve_core::{EngineConfig, ExcludedTest, Patch, Task};
use sieve_engine::{DependencyChecker, FingerprintHasher, TaskOrchestrator};
use tokio::fs as async_fs;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Route logs to stderr so stdout carries only JSON.
pub fn init_logging() {
    Registry::default()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sieve_engine=info,sieve_cli=info".into()),
        )
        .with(
            fmt::layer()
                .with_writer(stderr)
                .with_ansi(false)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

/// Report which required packages the configured interpreter lacks.
///
/// # Errors
/// Returns an error if the config is unreadable, the interpreter is missing,
/// or any package is not importable.
pub async fn handle_check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let checker = DependencyChecker::new(&config.interpreter, config.python_path.clone())?;
    let missing = checker.missing_packages(&config.required_packages).await?;

    emit(&json!({
        "interpreter": checker.interpreter(),
        "required": config.required_packages,
        "missing": missing,
    }))?;

    if !missing.is_empty() {
        bail!("{} required packages are not importable", missing.len());
    }
    Ok(())
}

/// Options for a single `run` invocation.
#[derive(Debug)]
pub struct RunRequest {
    /// Engine configuration file
    pub config: PathBuf,
    /// Keywords every selected test must match
    pub include: Vec<String>,
    /// Tests to deselect
    pub exclude: Vec<ExcludedTest>,
    /// Tree-relative target and the local file holding its new content
    pub patch: Option<(PathBuf, PathBuf)>,
}

/// Run one task and print its result.
///
/// # Errors
/// Returns an error if the engine cannot be built or the task fails.
pub async fn handle_run(request: RunRequest) -> Result<()> {
    let config = load_config(&request.config)?;

    let mut task = Task::new().include_all(request.include);
    for test in request.exclude {
        task = task.exclude(test);
    }
    if let Some((target, source)) = request.patch {
        let content = async_fs::read_to_string(&source)
            .await
            .with_context(|| format!("Failed to read patch file {}", source.display()))?;
        task = task.with_patch(Patch::new(target, content));
    }

    let orchestrator = TaskOrchestrator::new(config)
        .await
        .context("Failed to start engine")?;
    let result = orchestrator.run(&task).await.context("Task failed")?;

    emit(&result)
}

/// Print the fingerprint of `dir` and `command`.
///
/// # Errors
/// Returns an error if the directory cannot be hashed.
pub fn handle_fingerprint(dir: &Path, extensions: &[String], command: &str) -> Result<()> {
    let fingerprint = FingerprintHasher::new(extensions)
        .hash(dir, command)
        .with_context(|| format!("Failed to fingerprint {}", dir.display()))?;
    emit(&json!({ "fingerprint": fingerprint.to_hex() }))
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    EngineConfig::load_from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

#[allow(clippy::print_stdout, reason = "JSON output is the CLI's product")]
fn emit<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", to_string_pretty(value)?);
    Ok(())
}
