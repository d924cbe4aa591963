//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;
use owo_colors::Style;
use serde_json::Value;
use timeshift_common::{HealthStatus, HealthSummary};

use crate::application::services::plugins::PluginInfo;
use crate::application::services::templates::TemplateSummary;
use crate::domain::audit::AuditReport;
use crate::domain::config::TimeShiftConfig;
use crate::domain::network::{ConnectivityResult, IdracCheck};
use crate::domain::proxmox::{VmStatus, VmSummary};
use crate::domain::time::TimeStatus;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_version(&self, version: &str) {
        if !self.ctx.quiet {
            println!("timeshift {version}");
        }
    }

    /// Clock, timezone, NTP and any shift waiting to be restored.
    pub fn render_time_status(&self, status: &TimeStatus) {
        self.ctx.kv("Current time:", &status.current_time);
        self.ctx.kv(
            "Timezone:    ",
            status.timezone.as_deref().unwrap_or("(unknown)"),
        );
        self.ctx.kv(
            "NTP:         ",
            if status.ntp_enabled { "enabled" } else { "disabled" },
        );
        match &status.pending_backup {
            Some(backup) => {
                println!();
                self.ctx.warn(&format!(
                    "Clock is shifted. Original time {} ({}) saved at {}",
                    backup.timestamp, backup.timezone, backup.backup_created
                ));
                self.ctx.info("Run: timeshift restore");
            }
            None => self.ctx.success("No time shift pending"),
        }
    }

    pub fn render_health(&self, summary: &HealthSummary) {
        println!();
        println!("  {}", "Timeshift Health Check".style(self.ctx.styles.header));
        println!();
        let width = summary
            .checks
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0);
        for check in &summary.checks {
            let (mark, style) = status_mark(check.status, self.ctx);
            println!(
                "  {} {:<width$}  {}",
                mark.style(style),
                check.name,
                check.message
            );
        }
        println!();
        let (_, style) = status_mark(summary.overall_status, self.ctx);
        let counts = summary.status_counts;
        println!(
            "  Overall: {}  ({} healthy, {} warning, {} critical)",
            summary.overall_status.as_str().style(style),
            counts.healthy,
            counts.warning,
            counts.critical
        );
        println!("  {}", summary.message.style(self.ctx.styles.dim));
    }

    pub fn render_connectivity(&self, results: &[ConnectivityResult]) {
        for r in results {
            println!();
            println!(
                "  {}",
                format!("{}:{}", r.host, r.port).style(self.ctx.styles.header)
            );
            self.check_line(r.ping, "Ping");
            self.check_line(r.port_open, &format!("Port {}", r.port));
            match &r.ssl_cert {
                Some(cert) if cert.expired => self.ctx.warn(&format!(
                    "Certificate expired {} ({})",
                    cert.not_after.format("%Y-%m-%d"),
                    cert.subject
                )),
                Some(cert) => self.ctx.success(&format!(
                    "Certificate valid until {} ({} days)",
                    cert.not_after.format("%Y-%m-%d"),
                    cert.days_remaining
                )),
                None => self.ctx.info("No certificate retrieved"),
            }
            if let Some(ok) = r.idrac_accessible {
                self.check_line(ok, "iDRAC web interface");
            }
        }
    }

    pub fn render_idrac(&self, check: &IdracCheck) {
        println!();
        println!(
            "  {}",
            format!("iDRAC {}", check.host).style(self.ctx.styles.header)
        );
        self.check_line(check.ping, "Ping");
        self.check_line(check.port_open, "HTTPS port 443");
        if let Some(status) = check.http_status {
            self.ctx.kv("HTTP status:", &status.to_string());
        }
        match check.certificate_expired {
            Some(true) => {
                self.ctx.warn("Certificate is expired");
                self.ctx
                    .info("Shift the clock before the expiry date: timeshift time cert-date --expiry <DATE>");
            }
            Some(false) => self.ctx.success("Certificate is valid"),
            None => {}
        }
        println!();
        if check.accessible {
            self.ctx.success("iDRAC is accessible");
        } else {
            self.ctx.error(&format!(
                "iDRAC is not accessible: {}",
                check.failure.as_deref().unwrap_or("unknown reason")
            ));
        }
    }

    pub fn render_plugins(&self, plugins: &[PluginInfo]) {
        if plugins.is_empty() {
            self.ctx.info("No plugins registered");
            return;
        }
        println!(
            "  {}",
            format!(
                "{:<12} {:<8} {:<9} {:<9} {}",
                "NAME", "VERSION", "PRIORITY", "STATUS", "DESCRIPTION"
            )
            .style(self.ctx.styles.bold)
        );
        for p in plugins {
            println!(
                "  {:<12} {:<8} {:<9} {:<9} {}",
                p.metadata.name,
                p.metadata.version,
                p.metadata.priority.as_str(),
                p.status.as_str(),
                p.metadata.description
            );
        }
    }

    pub fn render_plugin_info(&self, plugin: &PluginInfo) {
        let meta = &plugin.metadata;
        println!("  {}", meta.name.style(self.ctx.styles.header));
        self.ctx.kv("Version:     ", &meta.version);
        self.ctx.kv("Author:      ", &meta.author);
        self.ctx.kv("Priority:    ", meta.priority.as_str());
        self.ctx.kv("Status:      ", plugin.status.as_str());
        self.ctx.kv("Description: ", &meta.description);
        self.ctx.kv("Actions:     ", &meta.capabilities.join(", "));
        if !meta.dependencies.is_empty() {
            self.ctx.kv("Depends on:  ", &meta.dependencies.join(", "));
        }
    }

    /// Result of a plugin action, shown as indented JSON.
    pub fn render_value(&self, value: &Value) {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        for line in text.lines() {
            println!("  {line}");
        }
    }

    pub fn render_templates(&self, templates: &[TemplateSummary]) {
        println!(
            "  {}",
            format!("{:<16} {:<6} {:<5} {}", "NAME", "FORMAT", "VARS", "DESCRIPTION")
                .style(self.ctx.styles.bold)
        );
        for t in templates {
            println!(
                "  {:<16} {:<6} {:<5} {}",
                t.name,
                t.format.extension(),
                t.variables,
                t.description
            );
        }
    }

    pub fn render_audit(&self, report: &AuditReport) {
        if report.is_clean() {
            self.ctx.success("No security issues found");
            return;
        }
        let sections = [
            ("CRITICAL", &report.critical, self.ctx.styles.error),
            ("HIGH", &report.high, self.ctx.styles.error),
            ("MEDIUM", &report.medium, self.ctx.styles.warning),
            ("LOW", &report.low, self.ctx.styles.info),
        ];
        for (label, findings, style) in sections {
            if findings.is_empty() {
                continue;
            }
            println!("  {}", format!("{label} ({})", findings.len()).style(style));
            for finding in findings {
                println!("    - {finding}");
            }
        }
        println!();
        println!("  {} issue(s) found", report.total());
    }

    /// Config with secrets masked, followed by security warnings.
    pub fn render_config(&self, config: &TimeShiftConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        self.render_value(&config.redacted());
        let warnings = config.security_warnings();
        if !warnings.is_empty() {
            println!();
            for w in &warnings {
                self.ctx.warn(w);
            }
        }
    }

    pub fn render_vm_list(&self, vms: &[VmSummary]) {
        if vms.is_empty() {
            self.ctx.info("No VMs on this node");
            return;
        }
        println!(
            "  {}",
            format!(
                "{:<6} {:<24} {:<9} {:>4} {:>9} {:>8}",
                "VMID", "NAME", "STATUS", "CPUS", "MEMORY", "UPTIME"
            )
            .style(self.ctx.styles.bold)
        );
        for vm in vms {
            println!(
                "  {:<6} {:<24} {:<9} {:>4} {:>9} {:>8}",
                vm.vmid,
                vm.name.as_deref().unwrap_or("-"),
                vm.status,
                vm.cpus.map_or_else(|| "-".to_string(), |c| format!("{c:.0}")),
                vm.maxmem.map_or_else(|| "-".to_string(), format_mib),
                vm.uptime.map_or_else(|| "-".to_string(), format_uptime),
            );
        }
    }

    pub fn render_vm_status(&self, vmid: u32, status: Option<&VmStatus>) {
        let Some(status) = status else {
            self.ctx.warn(&format!("VM {vmid}: status unavailable"));
            return;
        };
        let label = format!(
            "VM {vmid}{}",
            status
                .name
                .as_deref()
                .map(|n| format!(" ({n})"))
                .unwrap_or_default()
        );
        if status.is_running() {
            self.ctx.success(&format!("{label}: running"));
        } else {
            self.ctx.warn(&format!("{label}: {}", status.status));
        }
        if let Some(uptime) = status.uptime.filter(|u| *u > 0) {
            self.ctx.kv("    Uptime:", &format_uptime(uptime));
        }
        if let (Some(mem), Some(max)) = (status.mem, status.maxmem) {
            self.ctx
                .kv("    Memory:", &format!("{} / {}", format_mib(mem), format_mib(max)));
        }
    }

    fn check_line(&self, ok: bool, label: &str) {
        if ok {
            self.ctx.success(label);
        } else {
            self.ctx.error(&format!("{label} failed"));
        }
    }
}

fn status_mark(status: HealthStatus, ctx: &OutputContext) -> (&'static str, Style) {
    match status {
        HealthStatus::Healthy => ("✓", ctx.styles.success),
        HealthStatus::Warning => ("⚠", ctx.styles.warning),
        HealthStatus::Critical => ("✗", ctx.styles.error),
        HealthStatus::Unknown => ("?", ctx.styles.dim),
    }
}

/// Format seconds as `"Xd Yh"`, `"Xh Ym"` or `"Xm"`.
#[must_use]
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Bytes as whole MiB or GiB with one decimal.
#[must_use]
pub fn format_mib(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;
    if bytes >= GIB {
        #[allow(clippy::cast_precision_loss)]
        let gib = bytes as f64 / GIB as f64;
        format!("{gib:.1} GiB")
    } else {
        format!("{} MiB", bytes / MIB)
    }
}
