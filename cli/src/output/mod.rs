//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;
use serde_json::Value;
use timeshift_common::HealthSummary;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::application::services::plugins::PluginInfo;
use crate::application::services::templates::TemplateSummary;
use crate::domain::audit::AuditReport;
use crate::domain::config::TimeShiftConfig;
use crate::domain::network::{ConnectivityResult, IdracCheck};
use crate::domain::proxmox::{VmStatus, VmSummary};
use crate::domain::time::TimeStatus;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Dispatches each render call to the human or JSON renderer.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

macro_rules! dispatch {
    ($self:ident, $human:ident => $call:expr, $json:ident => $value:expr) => {
        match $self {
            Renderer::Human($human) => {
                $call;
                Ok(())
            }
            Renderer::Json($json) => $json.render($value),
        }
    };
}

#[allow(clippy::missing_errors_doc)] // every method fails only on JSON serialization
impl Renderer<'_> {
    pub fn render_version(&self, version: &str) -> Result<()> {
        dispatch!(self, h => h.render_version(version), j => &serde_json::json!({ "version": version }))
    }

    pub fn render_time_status(&self, status: &TimeStatus) -> Result<()> {
        dispatch!(self, h => h.render_time_status(status), j => status)
    }

    pub fn render_health(&self, summary: &HealthSummary) -> Result<()> {
        dispatch!(self, h => h.render_health(summary), j => summary)
    }

    pub fn render_connectivity(&self, results: &[ConnectivityResult]) -> Result<()> {
        dispatch!(self, h => h.render_connectivity(results), j => results)
    }

    pub fn render_idrac(&self, check: &IdracCheck) -> Result<()> {
        dispatch!(self, h => h.render_idrac(check), j => check)
    }

    pub fn render_plugins(&self, plugins: &[PluginInfo]) -> Result<()> {
        dispatch!(self, h => h.render_plugins(plugins), j => plugins)
    }

    pub fn render_plugin_info(&self, plugin: &PluginInfo) -> Result<()> {
        dispatch!(self, h => h.render_plugin_info(plugin), j => plugin)
    }

    pub fn render_value(&self, value: &Value) -> Result<()> {
        dispatch!(self, h => h.render_value(value), j => value)
    }

    pub fn render_templates(&self, templates: &[TemplateSummary]) -> Result<()> {
        dispatch!(self, h => h.render_templates(templates), j => templates)
    }

    pub fn render_audit(&self, report: &AuditReport) -> Result<()> {
        dispatch!(self, h => h.render_audit(report), j => report)
    }

    pub fn render_config(&self, config: &TimeShiftConfig, path: &std::path::Path) -> Result<()> {
        dispatch!(self, h => h.render_config(config, path), j => &config.redacted())
    }

    pub fn render_vm_list(&self, vms: &[VmSummary]) -> Result<()> {
        dispatch!(self, h => h.render_vm_list(vms), j => vms)
    }

    pub fn render_vm_statuses(&self, statuses: &[(u32, Option<VmStatus>)]) -> Result<()> {
        match self {
            Renderer::Human(h) => {
                for (vmid, status) in statuses {
                    h.render_vm_status(*vmid, status.as_ref());
                }
                Ok(())
            }
            Renderer::Json(j) => {
                let rows: Vec<Value> = statuses
                    .iter()
                    .map(|(vmid, status)| serde_json::json!({ "vmid": vmid, "status": status }))
                    .collect();
                j.render(&rows)
            }
        }
    }
}
