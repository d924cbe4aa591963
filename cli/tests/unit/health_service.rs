//! Tests for `application::services::health`.

#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use timeshift_cli::application::services::health::{
    BUILTIN_CHECKS, HealthCheck, HealthDeps, HealthMonitor, HealthSettings,
};
use timeshift_cli::domain::health::ResourceUsage;
use timeshift_common::HealthStatus;

use crate::helpers::ok_output;
use crate::mocks::{
    MemBackupStore, MemFs, MockProbe, MockProxmox, MockSystem, ScriptedRunner, backup,
};

const CALM: ResourceUsage = ResourceUsage {
    cpu_percent: 12.0,
    memory_percent: 40.0,
    disk_percent: 55.0,
};

struct Fixture {
    runner: ScriptedRunner,
    probe: MockProbe,
    system: MockSystem,
    fs: MemFs,
    backups: MemBackupStore,
    proxmox: Option<MockProxmox>,
    settings: HealthSettings,
}

impl Fixture {
    /// Everything healthy: NTP on, Docker running, Proxmox answering.
    fn healthy() -> Self {
        Self {
            runner: ScriptedRunner::new()
                .on("docker info", ok_output(b"Containers: 4\n Running: 3\n Paused: 0\n"))
                .on("docker --version", ok_output(b"Docker version 26.1.0, build 9714adc\n"))
                .on("timedatectl show --property=NTP", ok_output(b"NTP=yes\n")),
            probe: MockProbe::default(),
            system: MockSystem(Some(CALM)),
            fs: MemFs::default(),
            backups: MemBackupStore::default(),
            proxmox: Some(MockProxmox::new()),
            settings: HealthSettings {
                cert_dirs: vec![PathBuf::from("/etc/timeshift/certs")],
                private_files: vec![PathBuf::from("/etc/time-shift-config.json")],
                ..HealthSettings::default()
            },
        }
    }

    fn monitor(
        &self,
    ) -> HealthMonitor<'_, ScriptedRunner, MockProbe, MockSystem, MemFs, MemBackupStore, MockProxmox>
    {
        HealthMonitor::new(
            HealthDeps {
                runner: &self.runner,
                network: &self.probe,
                system: &self.system,
                fs: &self.fs,
                backups: &self.backups,
                proxmox: self.proxmox.as_ref(),
            },
            self.settings.clone(),
        )
    }
}

struct Flag {
    name: &'static str,
    outcome: Option<bool>,
}

#[async_trait::async_trait(?Send)]
impl HealthCheck for Flag {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self) -> Result<bool> {
        self.outcome.ok_or_else(|| anyhow::anyhow!("probe crashed"))
    }
}

#[tokio::test]
async fn all_builtin_checks_run_in_order_and_pass() {
    let fixture = Fixture::healthy();
    let results = fixture.monitor().run_all_checks().await;

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, BUILTIN_CHECKS);
    for r in &results {
        assert_eq!(r.status, HealthStatus::Healthy, "{}: {}", r.name, r.message);
    }

    let summary = fixture.monitor().summary().await;
    assert_eq!(summary.overall_status, HealthStatus::Healthy);
    assert_eq!(summary.total_checks, 7);
    assert_eq!(summary.status_counts.healthy, 7);
}

#[tokio::test]
async fn docker_details_are_collected() {
    let fixture = Fixture::healthy();
    let result = fixture.monitor().check_docker_daemon().await;
    assert_eq!(result.details["containers_running"], 3);
    assert_eq!(result.details["docker_version"], "Docker version 26.1.0, build 9714adc");
}

#[tokio::test]
async fn missing_docker_is_a_warning_and_a_hang_is_critical() {
    let mut fixture = Fixture::healthy();
    fixture.runner = ScriptedRunner::new().missing("docker");
    let result = fixture.monitor().check_docker_daemon().await;
    assert_eq!(result.status, HealthStatus::Warning);
    assert_eq!(result.message, "Docker is not installed");

    fixture.runner = ScriptedRunner::new().timing_out("docker");
    let result = fixture.monitor().check_docker_daemon().await;
    assert_eq!(result.status, HealthStatus::Critical);
    assert_eq!(result.message, "Docker daemon check timed out");
}

#[tokio::test]
async fn proxmox_without_token_warns_and_http_errors_warn() {
    let mut fixture = Fixture::healthy();
    fixture.proxmox = None;
    let result = fixture.monitor().check_proxmox_connection().await;
    assert_eq!(result.status, HealthStatus::Warning);

    let mut api = MockProxmox::new();
    api.version_status = Some(401);
    fixture.proxmox = Some(api);
    let result = fixture.monitor().check_proxmox_connection().await;
    assert_eq!(result.status, HealthStatus::Warning);
    assert!(result.message.contains("401"));
}

#[tokio::test]
async fn proxmox_version_is_reported() {
    let fixture = Fixture::healthy();
    let result = fixture.monitor().check_proxmox_connection().await;
    assert_eq!(result.details["version"], "8.1.4");
}

#[tokio::test]
async fn dns_failure_is_critical_and_slow_https_warns() {
    let mut fixture = Fixture::healthy();
    fixture.probe.resolves = false;
    let result = fixture.monitor().check_network_connectivity().await;
    assert_eq!(result.status, HealthStatus::Critical);
    assert_eq!(result.message, "DNS resolution failed");

    fixture.probe = MockProbe {
        http_elapsed: Duration::from_secs(7),
        ..MockProbe::default()
    };
    let result = fixture.monitor().check_network_connectivity().await;
    assert_eq!(result.status, HealthStatus::Warning);
    assert!(result.message.starts_with("Slow network response"));
}

#[tokio::test]
async fn full_disk_is_critical_and_missing_metrics_unknown() {
    let mut fixture = Fixture::healthy();
    fixture.system = MockSystem(Some(ResourceUsage {
        disk_percent: 97.5,
        ..CALM
    }));
    let result = fixture.monitor().check_system_resources().await;
    assert_eq!(result.status, HealthStatus::Critical);
    assert!(result.message.contains("High disk usage: 97.5%"));

    fixture.system = MockSystem(None);
    let result = fixture.monitor().check_system_resources().await;
    assert_eq!(result.status, HealthStatus::Unknown);
}

#[tokio::test]
async fn expired_certificates_are_listed() {
    let mut fixture = Fixture::healthy();
    fixture.fs = MemFs::default()
        .with_file("/etc/timeshift/certs/idrac.pem", "pem", 0o644)
        .with_file("/etc/timeshift/certs/notes.txt", "", 0o644);
    fixture.runner = ScriptedRunner::new().on(
        "openssl x509 -enddate -noout -in /etc/timeshift/certs/idrac.pem",
        ok_output(b"notAfter=Jan  5 10:00:00 2020 GMT\n"),
    );

    let result = fixture.monitor().check_ssl_certificates().await;

    assert_eq!(result.status, HealthStatus::Warning);
    assert_eq!(
        result.details["issues"],
        serde_json::json!(["idrac.pem: expired on 2020-01-05"])
    );
}

#[tokio::test]
async fn world_readable_private_files_are_flagged() {
    let mut fixture = Fixture::healthy();
    fixture.fs = MemFs::default().with_file("/etc/time-shift-config.json", "{}", 0o644);
    let result = fixture.monitor().check_file_permissions().await;
    assert_eq!(result.status, HealthStatus::Warning);

    fixture.fs = MemFs::default().with_file("/etc/time-shift-config.json", "{}", 0o600);
    let result = fixture.monitor().check_file_permissions().await;
    assert_eq!(result.status, HealthStatus::Healthy);
}

#[tokio::test]
async fn pending_shift_and_disabled_ntp_warn() {
    let mut fixture = Fixture::healthy();
    fixture.backups = MemBackupStore::with(backup("2024-05-01 10:00:00", true));
    let result = fixture.monitor().check_time_sync().await;
    assert_eq!(result.status, HealthStatus::Warning);
    assert_eq!(result.details["original_time"], "2024-05-01 10:00:00");

    fixture.backups = MemBackupStore::default();
    fixture.runner =
        ScriptedRunner::new().on("timedatectl show --property=NTP", ok_output(b"NTP=no\n"));
    let result = fixture.monitor().check_time_sync().await;
    assert_eq!(result.status, HealthStatus::Warning);
    assert_eq!(result.message, "NTP synchronization is disabled");
}

#[tokio::test]
async fn custom_checks_run_after_builtins_and_replace_by_name() {
    let fixture = Fixture::healthy();
    let mut monitor = fixture.monitor();
    monitor.register_check(Box::new(Flag {
        name: "idrac_reachable",
        outcome: Some(true),
    }));
    monitor.register_check(Box::new(Flag {
        name: "idrac_reachable",
        outcome: Some(false),
    }));
    monitor.register_check(Box::new(Flag {
        name: "crashy",
        outcome: None,
    }));

    let names = monitor.check_names();
    assert_eq!(names.len(), BUILTIN_CHECKS.len() + 2);

    let results = monitor.run_all_checks().await;
    let idrac = results.iter().find(|r| r.name == "idrac_reachable").expect("custom");
    assert_eq!(idrac.status, HealthStatus::Critical);
    let crashy = results.iter().find(|r| r.name == "crashy").expect("custom");
    assert_eq!(crashy.message, "Check failed: probe crashed");

    assert!(monitor.run_check("nope").await.is_none());
    let single = monitor.run_check("time_sync").await.expect("builtin");
    assert_eq!(single.status, HealthStatus::Healthy);
}
