//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `timeshift_common`, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use timeshift_common::TimeBackup;

use crate::domain::TimeShiftConfig;
use crate::domain::audit::AuditEvent;
use crate::domain::health::ResourceUsage;
use crate::domain::proxmox::{VmStatus, VmSummary};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`, killed after `timeout`.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Lets services emit progress without depending on the Presentation layer.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Configuration and State Ports ─────────────────────────────────────────────

/// Loads and persists the JSON configuration document.
pub trait ConfigStore {
    /// Load the config, falling back to defaults when the file is missing.
    fn load(&self) -> Result<TimeShiftConfig>;
    /// Raw JSON of the config file, `None` when it does not exist.
    fn load_raw(&self) -> Result<Option<Value>>;
    /// Persist `config` atomically.
    fn save(&self, config: &TimeShiftConfig) -> Result<()>;
    /// Resolved location of the config file.
    fn path(&self) -> PathBuf;
}

/// Persistence for the pre-shift clock backup.
#[allow(async_fn_in_trait)]
pub trait TimeBackupStore {
    /// Load the backup, returning `None` if no shift is pending.
    async fn load(&self) -> Result<Option<TimeBackup>>;
    async fn save(&self, backup: &TimeBackup) -> Result<()>;
    /// Remove the backup. Succeeds when it is already gone.
    async fn clear(&self) -> Result<()>;
}

/// Local filesystem access used by templates and health checks.
pub trait LocalFs {
    /// Write `contents`, creating parent directories. `private` files get
    /// mode 0600 on unix.
    fn write_file(&self, path: &Path, contents: &str, private: bool) -> Result<()>;
    fn read_file(&self, path: &Path) -> Result<String>;
    /// Unix permission bits, `None` when the file does not exist.
    fn file_mode(&self, path: &Path) -> Result<Option<u32>>;
    /// Files directly under `dir` with the given extension. A missing
    /// directory yields an empty list.
    fn find_files(&self, dir: &Path, extension: &str) -> Result<Vec<PathBuf>>;
    /// Hex SHA-256 of a file's contents.
    fn sha256_file(&self, path: &Path) -> Result<String>;
}

/// Source of built-in template bodies, keyed by file name.
pub trait TemplateSource {
    fn body(&self, file: &str) -> Option<String>;
}

/// Append-only security audit log.
pub trait AuditSink {
    fn record(&self, event: &AuditEvent) -> Result<()>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Result of a single HTTPS request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpProbe {
    pub status: u16,
    pub elapsed: Duration,
}

/// Socket-level and HTTP probes, mockable for service tests.
#[allow(async_fn_in_trait)]
pub trait NetworkProbe {
    /// `true` when a TCP connection succeeds within `timeout`.
    async fn tcp_connect(&self, host: &str, port: u16, timeout: Duration) -> Result<bool>;
    /// Resolve `host` to its addresses.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;
    /// `GET url`, optionally skipping certificate verification.
    async fn https_get(&self, url: &str, verify_tls: bool, timeout: Duration) -> Result<HttpProbe>;
}

// ── Host Metrics Port ─────────────────────────────────────────────────────────

#[allow(async_fn_in_trait)]
pub trait SystemProbe {
    /// Current CPU, memory and root-disk usage.
    async fn resource_usage(&self) -> Result<ResourceUsage>;
}

// ── Proxmox Port ──────────────────────────────────────────────────────────────

/// Proxmox VE REST operations against the configured node.
#[allow(async_fn_in_trait)]
pub trait ProxmoxApi {
    /// `GET /version`.
    async fn version(&self) -> Result<Value>;
    async fn list_vms(&self) -> Result<Vec<VmSummary>>;
    async fn vm_status(&self, vmid: u32) -> Result<VmStatus>;
    /// Returns the task UPID.
    async fn start_vm(&self, vmid: u32) -> Result<String>;
    /// Returns the task UPID.
    async fn stop_vm(&self, vmid: u32) -> Result<String>;
    /// Run a command through the QEMU guest agent; returns the agent reply.
    async fn exec_command(&self, vmid: u32, command: &str) -> Result<Value>;
    /// Returns the task UPID.
    async fn create_snapshot(&self, vmid: u32, name: &str, description: &str) -> Result<String>;
}
