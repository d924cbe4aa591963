//! `timeshift config` against a throwaway config file.

#![allow(clippy::expect_used)]

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("time-shift-config.json")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("timeshift"));
        cmd.env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("TIMESHIFT_CONFIG")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }

    fn json(&self, args: &[&str]) -> (Option<i32>, Value) {
        let output = self.cmd().args(args).arg("--json").output().expect("run");
        let doc = serde_json::from_slice(&output.stdout).expect("json on stdout");
        (output.status.code(), doc)
    }

    fn stored(&self) -> Value {
        let content = std::fs::read_to_string(self.config_path()).expect("config written");
        serde_json::from_str(&content).expect("valid json")
    }
}

#[test]
fn test_init_writes_defaults_once() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    assert_eq!(sandbox.stored()["time"]["max_shift_days"], 3650);

    sandbox
        .cmd()
        .args(["config", "init"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("use --force to overwrite"));

    sandbox.cmd().args(["config", "init", "--force"]).assert().success();
}

#[cfg(unix)]
#[test]
fn test_config_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let sandbox = Sandbox::new();
    sandbox.cmd().args(["config", "init"]).assert().success();
    let mode = std::fs::metadata(sandbox.config_path())
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_set_then_get_round_trips_through_the_file() {
    let sandbox = Sandbox::new();
    sandbox.cmd().args(["config", "init"]).assert().success();

    sandbox
        .cmd()
        .args(["config", "set", "time.max_shift_days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set time.max_shift_days = 30"));

    sandbox
        .cmd()
        .args(["config", "get", "time.max_shift_days"])
        .assert()
        .success()
        .stdout("30\n");
    assert!(sandbox.stored()["updated_at"].is_string());
}

#[test]
fn test_secrets_are_masked() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "set", "proxmox.token_secret", "6c1f0e7a-4b2d-49aa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("6c1f0e7a").not());

    sandbox
        .cmd()
        .args(["config", "get", "proxmox.token_secret"])
        .assert()
        .success()
        .stdout("********\n");

    let (code, doc) = sandbox.json(&["config", "show"]);
    assert_eq!(code, Some(0));
    assert_eq!(doc["proxmox"]["token_secret"], "********");
    assert_eq!(doc["idrac"]["default_password"], "********");
    assert_eq!(sandbox.stored()["proxmox"]["token_secret"], "6c1f0e7a-4b2d-49aa");
}

#[test]
fn test_set_rejects_unknown_keys_and_out_of_range_values() {
    let sandbox = Sandbox::new();

    let (code, doc) = sandbox.json(&["config", "set", "time.warp", "9"]);
    assert_eq!(code, Some(1));
    assert_eq!(doc["code"], "CONFIG_ERROR");

    sandbox
        .cmd()
        .args(["config", "set", "vm.cores", "99"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("vm.cores must be between 1 and 32"));

    assert!(!sandbox.config_path().exists());
}

#[test]
fn test_validate_reports_errors_in_a_hand_edited_file() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));

    std::fs::write(
        sandbox.config_path(),
        r#"{"proxmox": {"username": "root"}, "time": {"ntp_servers": []}}"#,
    )
    .expect("write");

    let (code, doc) = sandbox.json(&["config", "validate"]);
    assert_eq!(code, Some(1));
    assert_eq!(doc["valid"], false);
    let errors: Vec<&str> = doc["errors"]
        .as_array()
        .expect("errors")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(errors.iter().any(|e| e.contains("realm")));
    assert!(errors.iter().any(|e| e.contains("NTP server")));
}

#[test]
fn test_audit_flags_factory_credentials() {
    let sandbox = Sandbox::new();

    let (code, doc) = sandbox.json(&["config", "audit"]);
    assert_eq!(code, Some(1));
    assert!(doc["critical"]
        .as_array()
        .expect("critical")
        .iter()
        .any(|f| f.as_str().is_some_and(|s| s.contains("idrac.default_password"))));

    sandbox
        .cmd()
        .args(["config", "set", "idrac.default_password", "Xr7!vq2Lw9#pTz4m"])
        .assert()
        .success();
    let (code, doc) = sandbox.json(&["config", "audit"]);
    assert_eq!(code, Some(0));
    assert_eq!(doc["critical"], serde_json::json!([]));
}

#[test]
fn test_changes_are_written_to_the_audit_log() {
    let sandbox = Sandbox::new();
    let audit_log = sandbox.dir.path().join("audit").join("security.log");

    sandbox
        .cmd()
        .args(["config", "set", "security.audit_log_file"])
        .arg(&audit_log)
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["config", "set", "time.auto_restore_hours", "12"])
        .assert()
        .success();

    let log = std::fs::read_to_string(&audit_log).expect("audit log");
    let events: Vec<Value> = log
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert!(events
        .iter()
        .any(|e| e["action"] == "set" && e["resource"] == "time.auto_restore_hours"));
}
