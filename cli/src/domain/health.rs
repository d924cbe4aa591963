//! Health check thresholds, resource evaluation and summary aggregation.

use chrono::Utc;
use timeshift_common::{HealthCheckResult, HealthStatus, HealthSummary, StatusCounts};

/// Alerting thresholds, in percent (resources) and seconds (latency).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub response_time_secs: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            disk_percent: 90.0,
            response_time_secs: 5.0,
        }
    }
}

/// Point-in-time host resource usage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

/// Grade resource usage against the thresholds.
///
/// CPU over threshold is a warning. Memory over threshold is a warning, or
/// critical when another resource already tripped. Disk over threshold is
/// always critical.
#[must_use]
pub fn evaluate_resources(usage: &ResourceUsage, t: &Thresholds) -> HealthCheckResult {
    let mut status = HealthStatus::Healthy;
    let mut problems = Vec::new();

    if usage.cpu_percent > t.cpu_percent {
        status = HealthStatus::Warning;
        problems.push(format!("High CPU usage: {:.1}%", usage.cpu_percent));
    }
    if usage.memory_percent > t.memory_percent {
        status = if status == HealthStatus::Healthy {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        };
        problems.push(format!("High memory usage: {:.1}%", usage.memory_percent));
    }
    if usage.disk_percent > t.disk_percent {
        status = HealthStatus::Critical;
        problems.push(format!("High disk usage: {:.1}%", usage.disk_percent));
    }

    let message = if problems.is_empty() {
        "System resources within normal limits".to_string()
    } else {
        problems.join("; ")
    };

    HealthCheckResult::new("system_resources", status, message)
        .with_detail("cpu_percent", round1(usage.cpu_percent))
        .with_detail("memory_percent", round1(usage.memory_percent))
        .with_detail("disk_percent", round1(usage.disk_percent))
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Percentage helper that tolerates a zero total.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// Worst status wins: critical, then warning, then unknown, then healthy.
#[must_use]
pub fn overall_status(results: &[HealthCheckResult]) -> HealthStatus {
    let has = |s: HealthStatus| results.iter().any(|r| r.status == s);
    if has(HealthStatus::Critical) {
        HealthStatus::Critical
    } else if has(HealthStatus::Warning) {
        HealthStatus::Warning
    } else if has(HealthStatus::Unknown) {
        HealthStatus::Unknown
    } else {
        HealthStatus::Healthy
    }
}

/// Aggregate a run. An empty run is `unknown`.
#[must_use]
pub fn summarize(results: &[HealthCheckResult]) -> HealthSummary {
    let mut counts = StatusCounts::default();
    for r in results {
        counts.record(r.status);
    }

    let (overall, message) = if results.is_empty() {
        (
            HealthStatus::Unknown,
            "No health checks have been run".to_string(),
        )
    } else {
        let overall = overall_status(results);
        let message = match overall {
            HealthStatus::Healthy => format!("All {} checks passed", results.len()),
            HealthStatus::Warning => format!("{} check(s) reported warnings", counts.warning),
            HealthStatus::Critical => format!("{} check(s) are critical", counts.critical),
            HealthStatus::Unknown => format!("{} check(s) could not determine status", counts.unknown),
        };
        (overall, message)
    };

    HealthSummary {
        overall_status: overall,
        message,
        total_checks: results.len(),
        status_counts: counts,
        checks: results.to_vec(),
        timestamp: Utc::now(),
    }
}

/// Parse the `Running: N` line from `docker info` output.
#[must_use]
pub fn parse_docker_running(info: &str) -> Option<u64> {
    info.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Running:")?;
        rest.trim().parse().ok()
    })
}
