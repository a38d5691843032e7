//! Engine configuration: interpreter, tree layout and timeouts.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings consumed by the engine. Loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interpreter that runs the test framework
    pub interpreter: PathBuf,
    /// Extra import path exported as `PYTHONPATH` to every child process
    pub python_path: Option<PathBuf>,
    /// Primary checkout; absolute exclude and patch paths are made relative to it
    pub project_root: Option<PathBuf>,
    /// Test folder, relative to each working tree
    pub test_folder: PathBuf,
    /// Source folders to measure, relative to each working tree
    pub coverage_folders: Vec<PathBuf>,
    /// Pre-cloned working trees handed out by the pool
    pub working_trees: Vec<PathBuf>,
    /// File name of the coverage report written into the working tree root
    pub coverage_artifact: String,
    /// Packages that must be importable before any task is accepted
    pub required_packages: Vec<String>,
    /// Upper bound on waiting for a free working tree; `None` waits forever
    pub acquire_timeout_secs: Option<u64>,
    /// Upper bound on a single test run; `None` waits forever
    pub process_timeout_secs: Option<u64>,
}

impl EngineConfig {
    /// Default coverage report file name.
    pub const DEFAULT_ARTIFACT: &'static str = "coverage.json";
    /// Default wait for a free working tree.
    pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3600;
    /// Default limit on one test run.
    pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 1800;

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("Failed to read {}: {error}", path.display()))
        })?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {:?}: {} working trees, interpreter {:?}",
            path,
            config.working_trees.len(),
            config.interpreter
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check the settings that do not depend on the filesystem.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.as_os_str().is_empty() {
            return Err(Error::Config("interpreter must not be empty".to_owned()));
        }
        if self.coverage_artifact.trim().is_empty() {
            return Err(Error::Config(
                "coverage_artifact must not be empty".to_owned(),
            ));
        }
        if Path::new(&self.coverage_artifact).components().count() != 1 {
            return Err(Error::Config(format!(
                "coverage_artifact must be a bare file name, got {:?}",
                self.coverage_artifact
            )));
        }
        ensure_tree_relative("test_folder", &self.test_folder)?;
        for folder in &self.coverage_folders {
            ensure_tree_relative("coverage_folders", folder)?;
        }
        Ok(())
    }

    /// Wait limit for a free working tree.
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_secs.map(Duration::from_secs)
    }

    /// Limit on a single test process.
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            python_path: None,
            project_root: None,
            test_folder: PathBuf::from("tests"),
            coverage_folders: vec![PathBuf::from("src")],
            working_trees: Vec::new(),
            coverage_artifact: Self::DEFAULT_ARTIFACT.to_owned(),
            required_packages: vec!["pytest".to_owned(), "pytest_cov".to_owned()],
            acquire_timeout_secs: Some(Self::DEFAULT_ACQUIRE_TIMEOUT_SECS),
            process_timeout_secs: Some(Self::DEFAULT_PROCESS_TIMEOUT_SECS),
        }
    }
}

/// Working-tree relative paths must stay inside the tree.
fn ensure_tree_relative(field: &str, path: &Path) -> Result<()> {
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.as_os_str().is_empty() {
        return Err(Error::Config(format!(
            "{field} must be a non-empty path inside the working tree, got {}",
            path.display()
        )));
    }
    Ok(())
}
