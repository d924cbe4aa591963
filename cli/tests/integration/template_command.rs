//! `timeshift template` end to end.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn timeshift(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("timeshift"));
    cmd.env("NO_COLOR", "1")
        .env("TIMESHIFT_CONFIG", dir.path().join("config.json"))
        .env_remove("RUST_LOG")
        .current_dir(dir.path());
    cmd
}

#[test]
fn test_list_shows_builtin_templates() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["template", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("proxmox"))
        .stdout(predicate::str::contains("docker-compose"))
        .stdout(predicate::str::contains("environment"))
        .stdout(predicate::str::contains("kubernetes"));
}

#[test]
fn test_render_to_stdout_applies_variables() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["template", "render", "proxmox", "--var", "vm_cores=4", "--var", "proxmox_host=pve.lab"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).expect("rendered JSON");
    assert_eq!(doc["vm_defaults"]["cores"], 4);
    assert_eq!(doc["proxmox"]["host"], "pve.lab");
}

#[test]
fn test_out_of_range_variable_fails_unless_validation_is_skipped() {
    let dir = TempDir::new().expect("tempdir");
    let output = timeshift(&dir)
        .args(["template", "render", "proxmox", "--var", "vm_cores=500", "--json"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let doc: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["code"], "TEMPLATE_ERROR");

    timeshift(&dir)
        .args(["template", "render", "proxmox", "--var", "vm_cores=500", "--no-validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cores\": 500"));
}

#[test]
fn test_unknown_template_fails() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["template", "render", "nginx"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Template 'nginx' not found"));
}

#[cfg(unix)]
#[test]
fn test_sensitive_template_is_written_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("tempdir");
    let target = dir.path().join(".env");
    timeshift(&dir)
        .args(["template", "render", "environment", "--output"])
        .arg(&target)
        .assert()
        .success();

    let mode = std::fs::metadata(&target).expect("written").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    timeshift(&dir)
        .args(["template", "validate"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_config_set_writes_manifest() {
    let dir = TempDir::new().expect("tempdir");
    timeshift(&dir)
        .args(["template", "set", "lab", "proxmox", "kubernetes", "nginx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown template 'nginx' skipped"));

    let set_dir = dir.path().join("configs").join("lab");
    assert!(set_dir.join("proxmox.json").exists());
    assert!(set_dir.join("kubernetes.yaml").exists());
    let manifest: Value = serde_json::from_str(
        &std::fs::read_to_string(set_dir.join("manifest.json")).expect("manifest"),
    )
    .expect("json");
    assert_eq!(manifest["templates"], serde_json::json!(["proxmox", "kubernetes"]));
}

#[test]
fn test_validate_rejects_malformed_files() {
    let dir = TempDir::new().expect("tempdir");
    let bad = dir.path().join("broken.json");
    std::fs::write(&bad, "{\"proxmox\": ").expect("write");

    let output = timeshift(&dir)
        .args(["template", "validate", "--json"])
        .arg(&bad)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let doc: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(doc["valid"], false);
    assert!(doc["error"].as_str().is_some_and(|e| e.contains("invalid JSON")));

    let ini = dir.path().join("settings.conf");
    std::fs::write(&ini, "[main]\nkey = value\n").expect("write");
    timeshift(&dir)
        .args(["template", "validate", "--format", "ini"])
        .arg(&ini)
        .assert()
        .success();
}
