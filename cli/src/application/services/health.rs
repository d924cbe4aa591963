//! Application service: health-check framework.
//!
//! Built-in checks run concurrently via `tokio::join!`; registered custom
//! checks run after them via `join_all`. Nothing here panics on a failing
//! probe: every failure becomes a result with a status.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use futures_util::future::join_all;
use timeshift_common::{HealthCheckResult, HealthStatus, HealthSummary};
use tracing::{debug, warn};

use crate::application::ports::{
    CommandRunner, LocalFs, NetworkProbe, ProxmoxApi, SystemProbe, TimeBackupStore,
};
use crate::domain::error::ProxmoxError;
use crate::domain::health::{Thresholds, evaluate_resources, parse_docker_running, summarize};
use crate::domain::network::parse_openssl_date;

pub const BUILTIN_CHECKS: &[&str] = &[
    "system_resources",
    "network_connectivity",
    "docker_daemon",
    "proxmox_connection",
    "ssl_certificates",
    "file_permissions",
    "time_sync",
];

const DOCKER_TIMEOUT: Duration = Duration::from_secs(10);

/// A user-registered check. `Ok(true)` is healthy, `Ok(false)` critical,
/// and an error is critical with the error text.
#[async_trait::async_trait(?Send)]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> Result<bool>;
}

/// Where the probes point.
#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub thresholds: Thresholds,
    pub dns_probe_host: String,
    pub https_probe_url: String,
    /// Directories scanned for `*.pem` files.
    pub cert_dirs: Vec<PathBuf>,
    /// Certificates closer than this to expiry are reported.
    pub cert_warning_days: i64,
    /// Files that must not be group/world accessible.
    pub private_files: Vec<PathBuf>,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            dns_probe_host: "google.com".to_string(),
            https_probe_url: "https://www.google.com".to_string(),
            cert_dirs: vec![PathBuf::from("certs")],
            cert_warning_days: 30,
            private_files: vec![PathBuf::from(".env")],
        }
    }
}

/// Ports the built-in checks need.
pub struct HealthDeps<'a, R, N, S, F, B, A> {
    pub runner: &'a R,
    pub network: &'a N,
    pub system: &'a S,
    pub fs: &'a F,
    pub backups: &'a B,
    /// `None` when no Proxmox API token is configured.
    pub proxmox: Option<&'a A>,
}

pub struct HealthMonitor<'a, R, N, S, F, B, A> {
    deps: HealthDeps<'a, R, N, S, F, B, A>,
    settings: HealthSettings,
    custom: Vec<Box<dyn HealthCheck + 'a>>,
}

impl<'a, R, N, S, F, B, A> HealthMonitor<'a, R, N, S, F, B, A>
where
    R: CommandRunner,
    N: NetworkProbe,
    S: SystemProbe,
    F: LocalFs,
    B: TimeBackupStore,
    A: ProxmoxApi,
{
    #[must_use]
    pub fn new(deps: HealthDeps<'a, R, N, S, F, B, A>, settings: HealthSettings) -> Self {
        Self {
            deps,
            settings,
            custom: Vec::new(),
        }
    }

    /// Register a custom check. A later check with the same name replaces
    /// the earlier one.
    pub fn register_check(&mut self, check: Box<dyn HealthCheck + 'a>) {
        self.custom.retain(|c| c.name() != check.name());
        self.custom.push(check);
    }

    #[must_use]
    pub fn check_names(&self) -> Vec<String> {
        BUILTIN_CHECKS
            .iter()
            .map(ToString::to_string)
            .chain(self.custom.iter().map(|c| c.name().to_string()))
            .collect()
    }

    /// Run every built-in and custom check.
    pub async fn run_all_checks(&self) -> Vec<HealthCheckResult> {
        let (resources, network, docker, proxmox, certs, perms, time) = tokio::join!(
            self.check_system_resources(),
            self.check_network_connectivity(),
            self.check_docker_daemon(),
            self.check_proxmox_connection(),
            self.check_ssl_certificates(),
            self.check_file_permissions(),
            self.check_time_sync(),
        );
        let mut results = vec![resources, network, docker, proxmox, certs, perms, time];
        results.extend(join_all(self.custom.iter().map(|c| run_custom(c.as_ref()))).await);
        results
    }

    /// Run one check by name.
    pub async fn run_check(&self, name: &str) -> Option<HealthCheckResult> {
        let result = match name {
            "system_resources" => self.check_system_resources().await,
            "network_connectivity" => self.check_network_connectivity().await,
            "docker_daemon" => self.check_docker_daemon().await,
            "proxmox_connection" => self.check_proxmox_connection().await,
            "ssl_certificates" => self.check_ssl_certificates().await,
            "file_permissions" => self.check_file_permissions().await,
            "time_sync" => self.check_time_sync().await,
            other => run_custom(self.custom.iter().find(|c| c.name() == other)?.as_ref()).await,
        };
        Some(result)
    }

    /// Run everything and aggregate.
    pub async fn summary(&self) -> HealthSummary {
        summarize(&self.run_all_checks().await)
    }

    pub async fn check_system_resources(&self) -> HealthCheckResult {
        match self.deps.system.resource_usage().await {
            Ok(usage) => evaluate_resources(&usage, &self.settings.thresholds),
            Err(e) => HealthCheckResult::new(
                "system_resources",
                HealthStatus::Unknown,
                format!("Failed to check system resources: {e:#}"),
            ),
        }
    }

    pub async fn check_network_connectivity(&self) -> HealthCheckResult {
        const NAME: &str = "network_connectivity";
        let host = &self.settings.dns_probe_host;
        if let Err(e) = self.deps.network.resolve(host).await {
            return HealthCheckResult::new(NAME, HealthStatus::Critical, "DNS resolution failed")
                .with_detail("error", format!("{e:#}"));
        }

        let limit = self.settings.thresholds.response_time_secs;
        match self
            .deps
            .network
            .https_get(&self.settings.https_probe_url, true, Duration::from_secs(5))
            .await
        {
            Ok(probe) => {
                let secs = probe.elapsed.as_secs_f64();
                let (status, message) = if secs > limit {
                    (
                        HealthStatus::Warning,
                        format!("Slow network response: {secs:.2}s"),
                    )
                } else {
                    (HealthStatus::Healthy, "Network connectivity is good".to_string())
                };
                HealthCheckResult::new(NAME, status, message)
                    .with_detail("response_time", (secs * 1000.0).round() / 1000.0)
            }
            Err(e) => HealthCheckResult::new(
                NAME,
                HealthStatus::Critical,
                format!("Network connectivity check failed: {e:#}"),
            ),
        }
    }

    pub async fn check_docker_daemon(&self) -> HealthCheckResult {
        const NAME: &str = "docker_daemon";
        match self
            .deps
            .runner
            .run_with_timeout("docker", &["info"], DOCKER_TIMEOUT)
            .await
        {
            Ok(out) if out.status.success() => {
                let info = String::from_utf8_lossy(&out.stdout);
                let mut result =
                    HealthCheckResult::new(NAME, HealthStatus::Healthy, "Docker daemon is running");
                if let Some(running) = parse_docker_running(&info) {
                    result = result.with_detail("containers_running", running);
                }
                if let Some(version) = self.docker_version().await {
                    result = result.with_detail("docker_version", version);
                }
                result
            }
            Ok(out) => HealthCheckResult::new(NAME, HealthStatus::Critical, "Docker daemon is not responding")
                .with_detail("error", String::from_utf8_lossy(&out.stderr).trim().to_string()),
            Err(e) if is_not_found(&e) => {
                HealthCheckResult::new(NAME, HealthStatus::Warning, "Docker is not installed")
            }
            Err(e) if e.to_string().contains("timed out") => {
                HealthCheckResult::new(NAME, HealthStatus::Critical, "Docker daemon check timed out")
            }
            Err(e) => HealthCheckResult::new(
                NAME,
                HealthStatus::Critical,
                format!("Failed to check Docker: {e:#}"),
            ),
        }
    }

    async fn docker_version(&self) -> Option<String> {
        let out = self.deps.runner.run("docker", &["--version"]).await.ok()?;
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    pub async fn check_proxmox_connection(&self) -> HealthCheckResult {
        const NAME: &str = "proxmox_connection";
        let Some(api) = self.deps.proxmox else {
            return HealthCheckResult::new(
                NAME,
                HealthStatus::Warning,
                "Proxmox API token not configured",
            );
        };
        match api.version().await {
            Ok(version) => {
                let mut result =
                    HealthCheckResult::new(NAME, HealthStatus::Healthy, "Proxmox API is accessible");
                if let Some(v) = version.get("version") {
                    result = result.with_detail("version", v.clone());
                }
                result
            }
            Err(e) => match e.downcast_ref::<ProxmoxError>() {
                Some(ProxmoxError::Http { status, .. }) => HealthCheckResult::new(
                    NAME,
                    HealthStatus::Warning,
                    format!("Proxmox API returned status {status}"),
                ),
                _ => HealthCheckResult::new(
                    NAME,
                    HealthStatus::Critical,
                    format!("Cannot connect to Proxmox: {e:#}"),
                ),
            },
        }
    }

    pub async fn check_ssl_certificates(&self) -> HealthCheckResult {
        const NAME: &str = "ssl_certificates";
        let mut issues = Vec::new();
        let mut scanned = 0_u64;
        let now = chrono::Utc::now();

        for dir in &self.settings.cert_dirs {
            let files = match self.deps.fs.find_files(dir, "pem") {
                Ok(files) => files,
                Err(e) => {
                    return HealthCheckResult::new(
                        NAME,
                        HealthStatus::Unknown,
                        format!("Failed to check certificates: {e:#}"),
                    );
                }
            };
            for file in files {
                scanned += 1;
                let label = file
                    .file_name()
                    .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
                let path = file.to_string_lossy();
                let out = self
                    .deps
                    .runner
                    .run("openssl", &["x509", "-enddate", "-noout", "-in", &path])
                    .await;
                let not_after = out.ok().filter(|o| o.status.success()).and_then(|o| {
                    let text = String::from_utf8_lossy(&o.stdout).to_string();
                    text.trim()
                        .strip_prefix("notAfter=")
                        .and_then(parse_openssl_date)
                });
                match not_after {
                    None => issues.push(format!("{label}: unreadable certificate")),
                    Some(end) if end < now => {
                        issues.push(format!("{label}: expired on {}", end.format("%Y-%m-%d")));
                    }
                    Some(end) if (end - now).num_days() < self.settings.cert_warning_days => {
                        issues.push(format!("{label}: expires in {} days", (end - now).num_days()));
                    }
                    Some(_) => {}
                }
            }
        }

        if issues.is_empty() {
            HealthCheckResult::new(NAME, HealthStatus::Healthy, "SSL certificates are valid")
                .with_detail("scanned", scanned)
        } else {
            HealthCheckResult::new(
                NAME,
                HealthStatus::Warning,
                format!("Certificate issues found: {}", issues.len()),
            )
            .with_detail("issues", issues)
        }
    }

    pub async fn check_file_permissions(&self) -> HealthCheckResult {
        const NAME: &str = "file_permissions";
        let mut issues = Vec::new();
        for file in &self.settings.private_files {
            match self.deps.fs.file_mode(file) {
                Ok(Some(mode)) if mode & 0o077 != 0 => {
                    issues.push(format!("{} has overly permissive permissions", file.display()));
                }
                Ok(_) => {}
                Err(e) => {
                    return HealthCheckResult::new(
                        NAME,
                        HealthStatus::Unknown,
                        format!("Failed to check permissions: {e:#}"),
                    );
                }
            }
        }
        if issues.is_empty() {
            HealthCheckResult::new(NAME, HealthStatus::Healthy, "File permissions are correct")
        } else {
            HealthCheckResult::new(
                NAME,
                HealthStatus::Warning,
                format!("Permission issues found: {}", issues.len()),
            )
            .with_detail("issues", issues)
        }
    }

    pub async fn check_time_sync(&self) -> HealthCheckResult {
        const NAME: &str = "time_sync";
        match self.deps.backups.load().await {
            Ok(Some(backup)) => HealthCheckResult::new(
                NAME,
                HealthStatus::Warning,
                "Clock is shifted; run `timeshift restore` when done",
            )
            .with_detail("original_time", backup.timestamp)
            .with_detail("backup_created", backup.backup_created),
            Ok(None) => {
                if crate::application::services::time_shift::is_ntp_enabled(self.deps.runner).await {
                    HealthCheckResult::new(NAME, HealthStatus::Healthy, "NTP synchronization enabled")
                } else {
                    HealthCheckResult::new(NAME, HealthStatus::Warning, "NTP synchronization is disabled")
                }
            }
            Err(e) => HealthCheckResult::new(
                NAME,
                HealthStatus::Unknown,
                format!("Failed to read time backup: {e:#}"),
            ),
        }
    }
}

async fn run_custom(check: &dyn HealthCheck) -> HealthCheckResult {
    let name = check.name();
    debug!(check = name, "running custom health check");
    match check.check().await {
        Ok(true) => HealthCheckResult::new(name, HealthStatus::Healthy, "Check passed"),
        Ok(false) => HealthCheckResult::new(name, HealthStatus::Critical, "Check failed"),
        Err(e) => {
            warn!(check = name, error = %e, "health check errored");
            HealthCheckResult::new(name, HealthStatus::Critical, format!("Check failed: {e:#}"))
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
    })
}
