//! `timeshift config`: show, initialise, validate, edit and audit the
//! configuration file.

use anyhow::Result;
use std::process::ExitCode;

use clap::Subcommand;
use serde_json::json;

use crate::app::{AppContext, current_user};
use crate::application::ports::ConfigStore;
use crate::application::services::config_service;
use crate::domain::audit::AuditEvent;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (secrets masked)
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check the configuration against its ranges and rules
    Validate,
    /// Read one value
    Get {
        /// Dotted key, e.g. `time.max_shift_days`
        key: String,
    },
    /// Set one value
    Set {
        /// Dotted key, e.g. `proxmox.host`
        key: String,
        /// New value; lists are comma separated, `null` clears
        value: String,
    },
    /// Scan the configuration for weak or insecure settings
    Audit,
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written, or a key or
/// value is rejected.
pub fn run(app: &AppContext, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => show_config(app),
        ConfigCommand::Init { force } => init_config(app, force),
        ConfigCommand::Validate => validate_config(app),
        ConfigCommand::Get { key } => get_config(app, &key),
        ConfigCommand::Set { key, value } => set_config(app, &key, &value),
        ConfigCommand::Audit => audit_config(app),
    }
}

fn show_config(app: &AppContext) -> Result<ExitCode> {
    let config = app.config()?;
    app.renderer()
        .render_config(&config, &app.config_store.path())?;
    Ok(ExitCode::SUCCESS)
}

fn init_config(app: &AppContext, force: bool) -> Result<ExitCode> {
    let config = config_service::create_default_config(&app.config_store, force)?;
    let path = app.config_store.path();
    if app.is_json() {
        app.renderer()
            .render_value(&json!({ "created": true, "path": path }))?;
    } else {
        app.output
            .success(&format!("Wrote default configuration to {}", path.display()));
        for warning in config.security_warnings() {
            app.output.warn(&warning);
        }
        app.output
            .info("Run 'timeshift wizard' or 'timeshift config set' to fill in your environment.");
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_config(app: &AppContext) -> Result<ExitCode> {
    let config = app.config()?;
    let errors = config.violations();
    let warnings = config.security_warnings();

    if app.is_json() {
        app.renderer().render_value(&json!({
            "valid": errors.is_empty(),
            "errors": errors,
            "warnings": warnings,
        }))?;
    } else {
        for e in &errors {
            app.output.error(e);
        }
        for w in &warnings {
            app.output.warn(w);
        }
        if errors.is_empty() {
            app.output.success("Configuration is valid");
        }
    }
    Ok(if errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn is_secret(key: &str) -> bool {
    key.contains("secret") || key.contains("password")
}

fn get_config(app: &AppContext, key: &str) -> Result<ExitCode> {
    let config = app.config()?;
    let Some(mut value) = config.get(key) else {
        anyhow::bail!("Unknown setting: {key}");
    };
    if is_secret(key) && value.as_str().is_some_and(|s| !s.is_empty()) {
        value = json!("********");
    }
    match (&value, app.is_json()) {
        (serde_json::Value::String(s), false) => println!("{s}"),
        _ => println!("{value}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn set_config(app: &AppContext, key: &str, value: &str) -> Result<ExitCode> {
    let config = config_service::set_config_value(&app.config_store, key, value)?;

    let event = AuditEvent::new("config", &current_user(), "set", key, "success");
    config_service::record_audit(&app.audit_log(&config), &config, &event);

    let shown = if is_secret(key) {
        "********".to_string()
    } else {
        value.to_string()
    };
    if app.is_json() {
        app.renderer()
            .render_value(&json!({ "key": key, "value": shown }))?;
    } else {
        app.output.success(&format!("Set {key} = {shown}"));
    }
    Ok(ExitCode::SUCCESS)
}

fn audit_config(app: &AppContext) -> Result<ExitCode> {
    let report = config_service::audit_configuration(&app.config_store)?;
    app.renderer().render_audit(&report)?;
    Ok(if report.critical.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
