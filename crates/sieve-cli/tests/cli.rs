//! End-to-end CLI tests using `assert_cmd`
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get cargo binary or fail test
fn cargo_bin() -> Command {
    Command::cargo_bin("sieve").unwrap_or_else(|err| panic!("Binary not found: {err}"))
}

/// Helper to create temp dir or fail test
fn temp_dir() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"))
}

#[test]
fn test_cli_help() {
    cargo_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("fingerprint"));
}

#[test]
fn test_cli_invalid_command() {
    cargo_bin().arg("invalid-command-xyz").assert().failure();
}

#[test]
fn test_fingerprint_is_stable_hex() {
    let temp = temp_dir();
    fs::write(temp.path().join("mod.py"), "x = 1\n")
        .unwrap_or_else(|err| panic!("Failed to write source: {err}"));

    let run = || {
        cargo_bin()
            .args(["fingerprint", "--ext", "py", "--command", "pytest tests", "--dir"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout(predicate::str::is_match(r#""fingerprint": "[0-9a-f]{64}""#).unwrap())
            .get_output()
            .stdout
            .clone()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_check_with_missing_config_fails() {
    let temp = temp_dir();

    cargo_bin()
        .args(["check", "--config"])
        .arg(temp.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_run_rejects_malformed_exclude() {
    cargo_bin()
        .args([
            "run",
            "--config",
            "sieve.toml",
            "--exclude-function",
            "no_separator",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FILE::NAME"));
}

#[cfg(unix)]
#[test]
fn test_check_reports_missing_packages() {
    use std::os::unix::fs::PermissionsExt as _;

    let temp = temp_dir();
    let interpreter = temp.path().join("python");
    fs::write(
        &interpreter,
        "#!/bin/sh\n[ \"$3\" = \"pytest_cov\" ] && exit 1\nexit 0\n",
    )
    .unwrap_or_else(|err| panic!("Failed to write interpreter: {err}"));
    fs::set_permissions(&interpreter, fs::Permissions::from_mode(0o755))
        .unwrap_or_else(|err| panic!("Failed to chmod interpreter: {err}"));

    let tree = temp.path().join("clone-0");
    fs::create_dir_all(&tree).unwrap_or_else(|err| panic!("Failed to create tree: {err}"));
    let config = temp.path().join("sieve.toml");
    fs::write(
        &config,
        format!(
            "interpreter = \"{}\"\nworking_trees = [\"{}\"]\n",
            interpreter.display(),
            tree.display()
        ),
    )
    .unwrap_or_else(|err| panic!("Failed to write config: {err}"));

    cargo_bin()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"missing\": [\n    \"pytest_cov\"\n  ]"));
}
