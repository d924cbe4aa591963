//! Argument parsing, version output and the JSON error contract.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn timeshift(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("timeshift"));
    cmd.env("NO_COLOR", "1")
        .env("TIMESHIFT_CONFIG", dir.path().join("config.json"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_no_args_shows_help_and_exits_two() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir).assert().code(2).stderr(predicate::str::contains(
        "Shift the system clock to work with expired iDRAC certificates",
    ));
}

#[test]
fn test_help_lists_top_level_commands() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir).arg("--help").output().expect("run");
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["shift", "restore", "validate", "health", "plugins", "template", "wizard"] {
        assert!(help.contains(command), "--help does not mention {command}");
    }
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "timeshift {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_json() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["version", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_cert_date_prints_target() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["time", "cert-date", "--expiry", "2024-06-30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-05-31"));
}

#[test]
fn test_cert_date_custom_margin_json() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["time", "cert-date", "--expiry", "2024-03-01", "--days-before", "1", "--json"])
        .output()
        .expect("run");
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["target_date"], "2024-02-29");
}

#[test]
fn test_invalid_expiry_fails_with_json_error_object() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["time", "cert-date", "--expiry", "June 30", "--json"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["error"], true);
    assert_eq!(doc["code"], "COMMAND_FAILED");
    assert!(doc["message"].as_str().is_some_and(|m| m.contains("June 30")));
}

#[test]
fn test_invalid_expiry_human_error_on_stderr() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["time", "cert-date", "--expiry", "2024-13-01"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: Invalid expiry date"));
}

#[test]
fn test_unknown_health_check_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["health", "--check", "flux_capacitor"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown check 'flux_capacitor'"))
        .stderr(predicate::str::contains("time_sync"));
}
