//! Application context: unified state passed to every command handler.
//!
//! Adding a new cross-cutting concern requires one field change here and
//! no command signature changes.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::services::config_service;
use crate::domain::TimeShiftConfig;
use crate::infra::audit::JsonLinesAuditLog;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::JsonConfigStore;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `TIMESHIFT_YES` env vars).
    pub yes: bool,
    /// `--config` override of the config file location.
    pub config: Option<PathBuf>,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    pub mode: OutputMode,
    /// Config file resolved from `--config`, `TIMESHIFT_CONFIG` or the default.
    pub config_store: JsonConfigStore,
    /// Runner for clock, ping, openssl, docker and git commands.
    pub runner: TokioCommandRunner,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `TIMESHIFT_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    #[must_use]
    pub fn new(flags: AppFlags) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("TIMESHIFT_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet || flags.output.json),
            mode,
            config_store: JsonConfigStore::resolve(flags.behaviour.config),
            runner: TokioCommandRunner::default(),
            non_interactive,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Load the configuration (defaults when the file does not exist).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn config(&self) -> Result<TimeShiftConfig> {
        config_service::load_config(&self.config_store)
    }

    #[must_use]
    pub fn audit_log(&self, config: &TimeShiftConfig) -> JsonLinesAuditLog {
        JsonLinesAuditLog::new(config.security.audit_log_file.clone())
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `TIMESHIFT_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}

/// Name of the invoking user for audit records.
#[must_use]
pub fn current_user() -> String {
    std::env::var("SUDO_USER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string())
}
