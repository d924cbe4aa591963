//! `timeshift plugins` end to end. Only plugins that need no external
//! service are loaded here.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn timeshift(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("timeshift"));
    cmd.env("NO_COLOR", "1")
        .env("TIMESHIFT_CONFIG", dir.path().join("config.json"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_shows_builtins_by_priority() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["plugins", "list", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).expect("json");
    let names: Vec<&str> = doc
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, vec!["security", "docker", "proxmox", "git", "monitoring"]);
    assert!(doc.as_array().expect("array").iter().all(|p| p["status"] == "unloaded"));
}

#[test]
fn test_info_shows_actions() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["plugins", "info", "security"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration security audit"))
        .stdout(predicate::str::contains("scan, audit, harden, report"));
}

#[test]
fn test_unknown_plugin_is_a_plugin_error() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["plugins", "info", "ansible", "--json"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let doc: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["code"], "PLUGIN_ERROR");
}

#[test]
fn test_security_audit_reports_critical_risk_on_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["plugins", "run", "security", "audit", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["risk_level"], "critical");
    assert_eq!(doc["compliance"], "failed");
}

#[test]
fn test_proxmox_plugin_needs_a_token() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["plugins", "run", "proxmox", "status", "--param", "vmid=101"])
        .assert()
        .code(1);
}

#[test]
fn test_malformed_parameter_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["plugins", "run", "security", "scan", "--param", "verbose"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid parameter 'verbose'"));
}
