//! Fixtures shared by the engine integration tests.
//!
//! The fake interpreter is a POSIX shell script that stands in for a Python
//! install: it answers package probes and, when asked to run tests, writes a
//! canned coverage report into its working directory.
#![allow(dead_code, reason = "Not every test binary uses every fixture")]

use std::fs;
use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};

use sieve_core::EngineConfig;
use tempfile::TempDir;

/// Coverage report the fake interpreter writes on a normal run.
pub const REPORT: &str = r#"{
  "meta": {"version": "7.4.0", "timestamp": "2024-05-01T12:00:00", "branch_coverage": false},
  "files": {
    "src/app.py": {
      "executed_lines": [1, 2, 4],
      "missing_lines": [5],
      "excluded_lines": [],
      "summary": {"covered_lines": 3, "num_statements": 4, "missing_lines": 1,
                  "excluded_lines": 0, "percent_covered": 75.0}
    }
  },
  "totals": {"covered_lines": 3, "num_statements": 4, "missing_lines": 1,
             "excluded_lines": 0, "percent_covered": 75.0}
}"#;

/// What the fake interpreter leaves behind after a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// A report with one covered file
    Report,
    /// A well-formed report with no files
    Empty,
    /// No report at all
    Absent,
}

/// Builder for the fake interpreter script.
#[derive(Debug, Clone)]
pub struct FakePython {
    missing_packages: Vec<String>,
    artifact: Artifact,
    exit_code: i32,
    sleep: Option<&'static str>,
    log: Option<PathBuf>,
    extra: Vec<&'static str>,
}

impl Default for FakePython {
    fn default() -> Self {
        Self {
            missing_packages: Vec::new(),
            artifact: Artifact::Report,
            exit_code: 0,
            sleep: None,
            log: None,
            extra: Vec::new(),
        }
    }
}

impl FakePython {
    pub fn missing(mut self, package: &str) -> Self {
        self.missing_packages.push(package.to_owned());
        self
    }

    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = artifact;
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Sleep for `duration` (a `sleep(1)` argument) while "running tests".
    pub fn sleep(mut self, duration: &'static str) -> Self {
        self.sleep = Some(duration);
        self
    }

    /// Append `start` and `end` lines to `log` around each test run.
    pub fn log_to(mut self, log: PathBuf) -> Self {
        self.log = Some(log);
        self
    }

    /// Run a shell line inside the working tree before the report is written.
    pub fn also_run(mut self, line: &'static str) -> Self {
        self.extra.push(line);
        self
    }

    /// Write the script into `dir` and return its path.
    pub fn install(&self, dir: &Path) -> PathBuf {
        let log = self
            .log
            .as_ref()
            .map_or_else(|| "/dev/null".to_owned(), |path| path.display().to_string());
        let artifact = match self.artifact {
            Artifact::Report => format!("cat > coverage.json <<'SIEVE_EOF'\n{REPORT}\nSIEVE_EOF"),
            Artifact::Empty => {
                r#"echo '{"meta": {"version": "7.4.0"}, "files": {}}' > coverage.json"#.to_owned()
            }
            Artifact::Absent => ":".to_owned(),
        };
        let sleep = self
            .sleep
            .map_or_else(String::new, |duration| format!("sleep {duration}"));

        let script = format!(
            r#"#!/bin/sh
if [ "$1" = "-c" ]; then
  case " {missing} " in
    *" $3 "*) exit 1 ;;
  esac
  exit 0
fi
echo "start $$" >> '{log}'
echo "args: $*"
echo "pythonpath: $PYTHONPATH"
if [ -f src/app.py ]; then
  echo "app: $(cat src/app.py)"
fi
echo "collection warning" >&2
{sleep}
{extra}
{artifact}
echo "end $$" >> '{log}'
exit {code}
"#,
            missing = self.missing_packages.join(" "),
            extra = self.extra.join("\n"),
            code = self.exit_code,
        );

        let path = dir.join("python");
        fs::write(&path, script).unwrap_or_else(|err| panic!("Failed to write script: {err}"));
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .unwrap_or_else(|err| panic!("Failed to mark script executable: {err}"));
        path
    }
}

/// A temp directory holding `count` working trees and an interpreter.
pub struct Workspace {
    pub temp: TempDir,
    pub trees: Vec<PathBuf>,
    pub interpreter: PathBuf,
}

impl Workspace {
    pub fn new(count: usize, python: &FakePython) -> Self {
        let temp = TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"));
        let trees = (0..count)
            .map(|index| {
                let tree = temp.path().join(format!("clone-{index}"));
                fs::create_dir_all(tree.join("src"))
                    .unwrap_or_else(|err| panic!("Failed to create tree: {err}"));
                fs::write(tree.join("src/app.py"), "ORIGINAL\n")
                    .unwrap_or_else(|err| panic!("Failed to seed tree: {err}"));
                tree
            })
            .collect();
        let interpreter = python.install(temp.path());
        Self {
            temp,
            trees,
            interpreter,
        }
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            interpreter: self.interpreter.clone(),
            working_trees: self.trees.clone(),
            python_path: Some(self.temp.path().join("site")),
            ..EngineConfig::default()
        }
    }

    pub fn read(&self, tree: usize, relative: &str) -> String {
        fs::read_to_string(self.trees[tree].join(relative))
            .unwrap_or_else(|err| panic!("Failed to read {relative}: {err}"))
    }
}
