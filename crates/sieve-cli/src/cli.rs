use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sieve_core::ExcludedTest;

/// Command-line arguments for the sieve test runner
#[derive(Debug, Parser)]
#[command(name = "sieve")]
#[command(about = "Run selected tests under coverage across a pool of working trees", long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Probe the interpreter for the required packages
    Check {
        #[arg(short, long, help = "Engine configuration file")]
        config: PathBuf,
    },

    /// Run one task and print its coverage result as JSON
    Run {
        #[arg(short, long, help = "Engine configuration file")]
        config: PathBuf,

        #[arg(short, long = "include", help = "Keyword every selected test must match")]
        include: Vec<String>,

        #[arg(
            long = "exclude-method",
            value_name = "FILE::Class.method",
            value_parser = parse_method,
            help = "Deselect a test method"
        )]
        exclude_methods: Vec<ExcludedTest>,

        #[arg(
            long = "exclude-function",
            value_name = "FILE::function",
            value_parser = parse_function,
            help = "Deselect a test function"
        )]
        exclude_functions: Vec<ExcludedTest>,

        #[arg(long, requires = "patch_file", help = "Tree-relative file to replace")]
        patch_target: Option<PathBuf>,

        #[arg(long, requires = "patch_target", help = "Local file holding the replacement content")]
        patch_file: Option<PathBuf>,
    },

    /// Print the fingerprint of a directory and a command
    Fingerprint {
        #[arg(short, long, help = "Directory to hash")]
        dir: PathBuf,

        #[arg(short, long = "ext", help = "File extension to include (default: all files)")]
        extensions: Vec<String>,

        #[arg(long, help = "Command string folded into the digest")]
        command: String,
    },
}

fn parse_method(value: &str) -> Result<ExcludedTest, String> {
    split_test_id(value).map(|(file, name)| ExcludedTest::method(name, file))
}

fn parse_function(value: &str) -> Result<ExcludedTest, String> {
    split_test_id(value).map(|(file, name)| ExcludedTest::function(name, file))
}

fn split_test_id(value: &str) -> Result<(&str, &str), String> {
    match value.split_once("::") {
        Some((file, name)) if !file.is_empty() && !name.is_empty() => Ok((file, name)),
        _ => Err(format!("expected FILE::NAME, got `{value}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;
    use sieve_core::TestKind;
    use std::path::Path;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_method_ids_split_on_first_separator() {
        let test = parse_method("pkg/test_mod.py::TestClass.test_foo")
            .unwrap_or_else(|err| panic!("parse failed: {err}"));
        assert_eq!(test.declaring_file, Path::new("pkg/test_mod.py"));
        assert_eq!(test.name, "TestClass.test_foo");
        assert_eq!(test.kind, TestKind::Method);
    }

    #[test]
    fn test_malformed_ids_are_rejected() {
        assert!(parse_function("test_bar").is_err());
        assert!(parse_function("::test_bar").is_err());
        assert!(parse_function("tests/test_mod.py::").is_err());
    }

    #[test]
    fn test_patch_flags_require_each_other() {
        let parsed = Cli::try_parse_from([
            "sieve",
            "run",
            "--config",
            "sieve.toml",
            "--patch-target",
            "src/app.py",
        ]);
        assert!(parsed.is_err());
    }
}
