//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing works correctly without
//! touching any policy files.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;

fn tessera() -> Command {
    Command::cargo_bin("tessera").unwrap()
}

// ============================================================================
// Informational Commands
// ============================================================================

#[test]
fn version_command_succeeds() {
    tessera()
        .args(["--no-color", "version"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tessera"));
}

#[test]
fn version_flag_shows_version() {
    tessera()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tessera"));
}

#[test]
fn help_flag_shows_usage() {
    tessera()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("access control"));
}

#[test]
fn eval_help_shows_options() {
    tessera()
        .args(["eval", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--policies"))
        .stdout(predicate::str::contains("--compact"));
}

// ============================================================================
// Missing Required Arguments
// ============================================================================

#[test]
fn no_command_shows_help() {
    tessera()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn check_requires_path() {
    tessera()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn eval_requires_request() {
    tessera()
        .arg("eval")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

// ============================================================================
// Unrecognized Commands/Arguments
// ============================================================================

#[test]
fn unrecognized_command_shows_error() {
    tessera()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn unknown_flag_shows_error() {
    tessera()
        .args(["stats", "--verbose-mode"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
