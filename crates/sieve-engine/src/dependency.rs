use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use sieve_core::{Error, Result};
use tokio::process::Command;

/// Python snippet that exits 0 iff the module named by its argument is importable.
const FIND_SPEC_PROBE: &str =
    "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)";

/// Verifies an interpreter can import the packages the test framework needs.
#[derive(Debug, Clone)]
pub struct DependencyChecker {
    interpreter: PathBuf,
    python_path: Option<PathBuf>,
}

impl DependencyChecker {
    /// Create a checker for `interpreter`.
    ///
    /// # Errors
    /// Returns `Error::InterpreterNotFound` if the interpreter does not exist.
    /// Bare names are looked up on `PATH`.
    pub fn new(interpreter: &Path, python_path: Option<PathBuf>) -> Result<Self> {
        let resolved = resolve_interpreter(interpreter).ok_or_else(|| {
            Error::InterpreterNotFound {
                path: interpreter.to_path_buf(),
            }
        })?;
        Ok(Self {
            interpreter: resolved,
            python_path,
        })
    }

    /// Resolved interpreter path.
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Names from `packages` that the interpreter cannot import, in input order.
    ///
    /// # Errors
    /// Returns an error if a probe process cannot be started.
    pub async fn missing_packages(&self, packages: &[String]) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for package in packages {
            if !self.is_importable(package).await? {
                missing.push(package.clone());
            }
        }
        Ok(missing)
    }

    /// Fail unless every package in `packages` is importable.
    ///
    /// # Errors
    /// Returns `Error::MissingPackages` listing every package that failed.
    pub async fn ensure(&self, packages: &[String]) -> Result<()> {
        let missing = self.missing_packages(packages).await?;
        if missing.is_empty() {
            tracing::debug!(
                "All {} required packages importable by {}",
                packages.len(),
                self.interpreter.display()
            );
            return Ok(());
        }
        Err(Error::MissingPackages {
            interpreter: self.interpreter.clone(),
            packages: missing,
        })
    }

    async fn is_importable(&self, package: &str) -> Result<bool> {
        let mut command = Command::new(&self.interpreter);
        command
            .arg("-c")
            .arg(FIND_SPEC_PROBE)
            .arg(package)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(python_path) = &self.python_path {
            command.env("PYTHONPATH", python_path);
        }

        let status = command.status().await?;
        if !status.success() {
            tracing::debug!("Package {package} is not importable");
        }
        Ok(status.success())
    }
}

/// Absolute or relative paths must exist; bare names are searched on `PATH`.
fn resolve_interpreter(interpreter: &Path) -> Option<PathBuf> {
    if interpreter.components().count() > 1 || interpreter.is_absolute() {
        return interpreter.is_file().then(|| interpreter.to_path_buf());
    }
    let search = env::var_os("PATH")?;
    env::split_paths(&search)
        .map(|dir| dir.join(interpreter))
        .find(|candidate| candidate.is_file())
}
