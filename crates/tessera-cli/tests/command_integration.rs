//! Integration tests for CLI commands.
//!
//! Each test works in its own temporary project directory so user or
//! repository configuration cannot leak in.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ADMIN_POLICY: &str = r#"{
    "policy_id": "admin-access",
    "name": "Admin access",
    "rules": [{
        "rule_id": "admins",
        "effect": "allow",
        "conditions": [
            {"attribute_name": "subject.role", "operator": "eq", "expected_value": "admin"}
        ]
    }]
}"#;

const AFTER_HOURS_POLICY: &str = r#"{
    "policy_id": "after-hours",
    "name": "No access after hours",
    "priority": 10,
    "combining_algorithm": "deny-overrides",
    "rules": [{
        "rule_id": "deny-night",
        "effect": "deny",
        "conditions": [
            {"attribute_name": "environment.hour", "operator": "gte", "expected_value": 20}
        ]
    }]
}"#;

fn tessera(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tessera").unwrap();
    cmd.arg("--no-color").arg("-C").arg(project);
    cmd
}

fn project_with_policies() -> TempDir {
    let temp = TempDir::new().unwrap();
    let policies = temp.path().join("policies");
    fs::create_dir(&policies).unwrap();
    fs::write(policies.join("10-admin.json"), ADMIN_POLICY).unwrap();
    fs::write(policies.join("20-after-hours.json"), AFTER_HOURS_POLICY).unwrap();
    temp
}

fn write_request(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("request.json");
    fs::write(&path, body).unwrap();
    path
}

// ============================================================================
// check
// ============================================================================

#[test]
fn check_valid_directory_succeeds() {
    let project = project_with_policies();

    tessera(project.path())
        .arg("check")
        .arg(project.path().join("policies"))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 policies valid"));
}

#[test]
fn check_rejects_rule_without_conditions() {
    let project = TempDir::new().unwrap();
    let file = project.path().join("bad.json");
    fs::write(
        &file,
        r#"{"policy_id": "bad", "rules": [{"rule_id": "r", "effect": "allow", "conditions": []}]}"#,
    )
    .unwrap();

    tessera(project.path())
        .arg("check")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation failed"));
}

#[test]
fn check_rejects_unknown_effect() {
    let project = TempDir::new().unwrap();
    let file = project.path().join("bad.json");
    fs::write(&file, ADMIN_POLICY.replace("\"allow\"", "\"maybe\"")).unwrap();

    tessera(project.path())
        .arg("check")
        .arg(&file)
        .assert()
        .failure();
}

#[test]
fn check_rejects_duplicate_policy_ids() {
    let project = TempDir::new().unwrap();
    let dir = project.path().join("policies");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a.json"), ADMIN_POLICY).unwrap();
    fs::write(dir.join("b.json"), ADMIN_POLICY).unwrap();

    tessera(project.path())
        .arg("check")
        .arg(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));
}

// ============================================================================
// eval
// ============================================================================

#[test]
fn eval_uses_configured_policy_directory() {
    let project = project_with_policies();
    let request = write_request(
        project.path(),
        r#"{"request_id": "r1", "subject": {"role": "admin"}, "environment": {"hour": 10}}"#,
    );

    let output = tessera(project.path())
        .arg("eval")
        .arg(&request)
        .arg("--compact")
        .output()
        .unwrap();

    assert!(output.status.success());
    let decision: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decision["decision"], "allow");
    assert_eq!(decision["matched_rules"][0], "admins");
}

#[test]
fn eval_deny_overrides() {
    let project = project_with_policies();
    let request = write_request(
        project.path(),
        r#"{"request_id": "r2", "subject": {"role": "admin"}, "environment": {"hour": 22}}"#,
    );

    tessera(project.path())
        .arg("eval")
        .arg(&request)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""decision": "deny""#))
        .stdout(predicate::str::contains("deny-night"));
}

#[test]
fn eval_with_explicit_policy_file() {
    let project = TempDir::new().unwrap();
    let policy = project.path().join("admin.json");
    fs::write(&policy, ADMIN_POLICY).unwrap();
    let request = write_request(
        project.path(),
        r#"{"request_id": "r3", "subject": {"role": "guest"}}"#,
    );

    tessera(project.path())
        .arg("eval")
        .arg(&request)
        .arg("--policies")
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("not_applicable"));
}

#[test]
fn eval_missing_request_fails() {
    let project = project_with_policies();

    tessera(project.path())
        .args(["eval", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read request"));
}

// ============================================================================
// stats and configuration
// ============================================================================

#[test]
fn stats_json_reports_index() {
    let project = project_with_policies();

    let output = tessera(project.path())
        .args(["stats", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["policies"]["total_policies"], 2);
    assert_eq!(stats["policies"]["indexed_attributes"], 2);
    assert_eq!(stats["cache"]["enabled"], true);
}

#[test]
fn project_config_disables_cache() {
    let project = project_with_policies();
    fs::write(
        project.path().join("tessera.toml"),
        "[engine]\ncache_enabled = false\n",
    )
    .unwrap();

    tessera(project.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));
}

#[test]
fn invalid_config_fails_before_running() {
    let project = project_with_policies();
    fs::write(
        project.path().join("tessera.toml"),
        "[engine]\ncache_ttl_secs = 0\n",
    )
    .unwrap();

    tessera(project.path())
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
