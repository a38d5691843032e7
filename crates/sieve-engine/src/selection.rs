//! Translation of a task's include and exclude sets into a pytest invocation.

use std::path::{Component, Path, PathBuf};

use sieve_core::{EngineConfig, ExcludedTest, Task, TestKind};

/// Module name passed to `-m`.
const TEST_FRAMEWORK: &str = "pytest";

/// Flags appended to every invocation after the selection tokens.
const COMMON_FLAGS: [&str; 2] = ["--color", "no"];

/// A fully resolved test command. Never run through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCommand {
    /// Interpreter to execute
    pub program: PathBuf,
    /// Arguments after the interpreter
    pub args: Vec<String>,
    /// Working tree the command runs in
    pub cwd: PathBuf,
}

impl SelectionCommand {
    /// The invocation without its working directory, identical for every tree.
    pub fn invocation(&self) -> String {
        let mut rendered = shell_quote(&self.program.to_string_lossy());
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&shell_quote(arg));
        }
        rendered
    }

    /// The invocation prefixed with a change of directory, for diagnostics.
    pub fn to_shell_string(&self) -> String {
        format!(
            "cd {} && {}",
            shell_quote(&self.cwd.to_string_lossy()),
            self.invocation()
        )
    }
}

/// Builds pytest selection commands for one engine configuration.
#[derive(Debug, Clone)]
pub struct SelectionCommandBuilder {
    interpreter: PathBuf,
    test_folder: PathBuf,
    coverage_folders: Vec<PathBuf>,
    project_root: Option<PathBuf>,
}

impl SelectionCommandBuilder {
    /// Create a builder from the engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            test_folder: config.test_folder.clone(),
            coverage_folders: config.coverage_folders.clone(),
            project_root: config.project_root.clone(),
        }
    }

    /// Build the command that runs `task` inside the working tree at `root`.
    pub fn build(&self, task: &Task, root: &Path) -> SelectionCommand {
        let mut args = vec![
            "-m".to_owned(),
            TEST_FRAMEWORK.to_owned(),
            to_posix(&self.test_folder),
            "--tb".to_owned(),
            "short".to_owned(),
        ];

        if let Some(expression) = include_expression(task.included()) {
            args.push("-k".to_owned());
            args.push(expression);
        }

        for test in task.excluded() {
            args.push("--deselect".to_owned());
            args.push(self.deselect_token(test, root));
        }

        args.extend(COMMON_FLAGS.iter().map(|flag| (*flag).to_owned()));
        for folder in &self.coverage_folders {
            args.push(format!("--cov={}", to_posix(folder)));
        }
        args.extend(
            [
                "--cov-report",
                "json",
                "--continue-on-collection-errors",
                "--disable-warnings",
            ]
            .iter()
            .map(|flag| (*flag).to_owned()),
        );

        SelectionCommand {
            program: self.interpreter.clone(),
            args,
            cwd: root.to_path_buf(),
        }
    }

    /// Render `test` as `<posix-relative-path>::<qualified-name>`.
    pub fn deselect_token(&self, test: &ExcludedTest, root: &Path) -> String {
        let file = self.relative_file(&test.declaring_file, root);
        let name = match test.kind {
            TestKind::Method => qualify_method(&test.name),
            TestKind::Function => test.name.clone(),
        };
        format!("{}::{name}", to_posix(&file))
    }

    fn relative_file(&self, file: &Path, root: &Path) -> PathBuf {
        if !file.is_absolute() {
            return file.to_path_buf();
        }
        file.strip_prefix(root)
            .ok()
            .or_else(|| {
                self.project_root
                    .as_deref()
                    .and_then(|project| file.strip_prefix(project).ok())
            })
            .map_or_else(|| file.to_path_buf(), Path::to_path_buf)
    }
}

/// AND together every include identifier; `None` when there is no filter.
fn include_expression(identifiers: &[String]) -> Option<String> {
    if identifiers.is_empty() {
        return None;
    }
    Some(identifiers.join(" and "))
}

/// `Class.method[param.id]` becomes `Class::method[param.id]`.
fn qualify_method(name: &str) -> String {
    let (base, params) = name.find('[').map_or((name, ""), |index| name.split_at(index));
    format!("{}{params}", base.replace('.', "::"))
}

/// Join path components with `/` whatever the host separator is.
fn to_posix(path: &Path) -> String {
    let mut rendered = String::new();
    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::RootDir => {
                rendered.push('/');
                continue;
            }
            _ => {}
        }
        if !rendered.is_empty() && !rendered.ends_with('/') {
            rendered.push('/');
        }
        rendered.push_str(&component.as_os_str().to_string_lossy().replace('\\', "/"));
    }
    rendered
}

/// Single-quote `value` for display when it contains shell metacharacters.
fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value.chars().all(|character| {
            character.is_ascii_alphanumeric() || "-_./=:,+@%".contains(character)
        });
    if is_plain {
        return value.to_owned();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for character in value.chars() {
        if character == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(character);
        }
    }
    quoted.push('\'');
    quoted
}
