//! `timeshift wizard`: interactive configuration.

use std::process::ExitCode;

use anyhow::Result;
use dialoguer::{Confirm, Input, Password};

use crate::app::{AppContext, current_user};
use crate::application::ports::ConfigStore;
use crate::application::services::config_service;
use crate::domain::audit::AuditEvent;
use crate::domain::validate::{
    validate_host, validate_idrac_credentials, validate_proxmox_node, validate_username,
};

fn text(prompt: &str, current: &str) -> Result<String> {
    Ok(Input::<String>::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .interact_text()?)
}

/// Password prompt; an empty answer keeps the current value.
fn secret(prompt: &str, current: &str) -> Result<String> {
    let hint = if current.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt} (enter to keep)")
    };
    let entered = Password::new()
        .with_prompt(hint)
        .allow_empty_password(true)
        .interact()?;
    Ok(if entered.is_empty() {
        current.to_string()
    } else {
        entered
    })
}

fn yes_no(prompt: &str, current: bool) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(current).interact()?)
}

/// Walk through the main settings and save them.
///
/// # Errors
///
/// Returns an error when run non-interactively, when a prompt fails, or
/// when the result does not validate.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    if app.non_interactive || app.is_json() {
        anyhow::bail!("The wizard needs an interactive terminal (unset CI/TIMESHIFT_YES, drop --yes and --json)");
    }
    let mut config = app.config()?;

    app.output.header("Proxmox");
    config.proxmox.host = validate_host(&text("Host", &config.proxmox.host)?)?;
    config.proxmox.port = Input::<u16>::new()
        .with_prompt("Port")
        .default(config.proxmox.port)
        .interact_text()?;
    config.proxmox.username = validate_username(&text("User (user@realm)", &config.proxmox.username)?)?;
    config.proxmox.node = validate_proxmox_node(&text("Node", &config.proxmox.node)?)?;
    config.proxmox.token_id = text("API token id", &config.proxmox.token_id)?;
    config.proxmox.token_secret = secret("API token secret", &config.proxmox.token_secret)?;
    config.proxmox.verify_ssl = yes_no("Verify TLS certificates", config.proxmox.verify_ssl)?;

    println!();
    app.output.header("Time shifting");
    config.time.max_shift_days = Input::<u32>::new()
        .with_prompt("Maximum shift (days)")
        .default(config.time.max_shift_days)
        .interact_text()?;
    config.time.use_sudo = yes_no("Run clock commands through sudo", config.time.use_sudo)?;

    println!();
    app.output.header("iDRAC");
    let previous_password = config.idrac.default_password.clone();
    config.idrac.default_username = text("Username", &config.idrac.default_username)?;
    config.idrac.default_password = secret("Password", &previous_password)?;
    if config.idrac.default_password != previous_password {
        validate_idrac_credentials(&config.idrac.default_username, &config.idrac.default_password)?;
    }

    println!();
    app.output.header("Security");
    config.security.require_confirmation = yes_no(
        "Ask before shifting the clock",
        config.security.require_confirmation,
    )?;

    config_service::save_config(&app.config_store, &mut config)?;
    let event = AuditEvent::new("config", &current_user(), "wizard", "configuration", "success");
    config_service::record_audit(&app.audit_log(&config), &config, &event);

    println!();
    app.output.success(&format!(
        "Configuration saved to {}",
        app.config_store.path().display()
    ));
    for warning in config.security_warnings() {
        app.output.warn(&warning);
    }
    Ok(ExitCode::SUCCESS)
}
