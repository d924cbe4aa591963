//! Shared test helpers: output constructors and config fixtures.

#![allow(dead_code)]

use std::process::{ExitStatus, Output};

use timeshift_cli::domain::TimeShiftConfig;

// ── Cross-platform ExitStatus construction ───────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// The raw wait-status encodes the exit code in bits 8–15, so we shift.
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

// ── Config fixtures ──────────────────────────────────────────────────────────

/// Defaults with a Proxmox token filled in and root allowed, so the
/// default-config warnings stay out of the way.
pub fn configured() -> TimeShiftConfig {
    let mut config = TimeShiftConfig::default();
    config.proxmox.host = "pve.lab".to_string();
    config.proxmox.token_id = "timeshift".to_string();
    config.proxmox.token_secret = "0f9c8d2e-secret".to_string();
    config.proxmox.node = "pve".to_string();
    config
}
