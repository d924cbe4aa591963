//! `timeshift shift`, `timeshift restore` and `timeshift time ...`.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::app::{AppContext, current_user};
use crate::application::services::{config_service, time_shift};
use crate::application::services::time_shift::TimeOptions;
use crate::domain::TimeShiftConfig;
use crate::domain::audit::AuditEvent;
use crate::domain::time::{DEFAULT_CERT_MARGIN_DAYS, calculate_cert_valid_date};
use crate::infra::backup::FileBackupStore;
use crate::output::TerminalReporter;

/// Arguments for `timeshift shift`.
#[derive(Args)]
pub struct ShiftArgs {
    /// Date to move the clock to (YYYY-MM-DD); the clock is set to noon
    #[arg(long, short = 't', value_name = "DATE")]
    pub target_date: String,
}

/// `timeshift time` subcommands.
#[derive(Subcommand)]
pub enum TimeCommand {
    /// Show the current clock, NTP state and any pending restore
    Status,
    /// Compute a date at which a certificate is still valid
    CertDate {
        /// Certificate expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: String,
        /// Days before expiry to target
        #[arg(long, default_value_t = DEFAULT_CERT_MARGIN_DAYS)]
        days_before: i64,
    },
}

fn options(config: &TimeShiftConfig) -> TimeOptions {
    TimeOptions {
        use_sudo: config.time.use_sudo,
        max_shift_days: config.time.max_shift_days,
        settle: Duration::from_secs(config.time.ntp_settle_seconds),
    }
}

fn backup_store(config: &TimeShiftConfig) -> FileBackupStore {
    FileBackupStore::new(config.time.backup_file.clone())
}

/// Run `timeshift shift`.
///
/// # Errors
///
/// Returns an error if the shift is refused, fails, or is rolled back.
pub async fn shift(app: &AppContext, args: &ShiftArgs) -> Result<ExitCode> {
    let config = app.config()?;

    if !config.security.allow_root && time_shift::effective_uid(&app.runner).await == Some(0) {
        anyhow::bail!(
            "Refusing to shift the clock as root. Run as a sudo-capable user or set security.allow_root = true."
        );
    }

    if config.security.require_confirmation {
        let prompt = format!(
            "Shift the system clock to {}? NTP stays off until 'timeshift restore'.",
            args.target_date
        );
        if !app.confirm(&prompt, true)? {
            app.output.info("Cancelled");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let store = backup_store(&config);
    let reporter = TerminalReporter::new(&app.output);
    let audit = app.audit_log(&config);
    let event = AuditEvent::new("time", &current_user(), "shift", "system_clock", "success")
        .with_context("target_date", args.target_date.as_str());

    let result = time_shift::shift_time(
        &app.runner,
        &store,
        &reporter,
        &options(&config),
        &args.target_date,
        Local::now().date_naive(),
    )
    .await;

    match result {
        Ok(backup) => {
            config_service::record_audit(&audit, &config, &event);
            if app.is_json() {
                app.renderer().render_value(&json!({
                    "shifted": true,
                    "target_date": args.target_date,
                    "backup": backup,
                }))?;
            } else {
                app.output.info("Run 'timeshift restore' when you are done.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let failed = AuditEvent {
                result: "failure".to_string(),
                ..event
            }
            .with_context("error", format!("{e:#}"));
            config_service::record_audit(&audit, &config, &failed);
            Err(e)
        }
    }
}

/// Run `timeshift restore`.
///
/// # Errors
///
/// Returns an error if a restore command fails.
pub async fn restore(app: &AppContext) -> Result<ExitCode> {
    let config = app.config()?;
    let store = backup_store(&config);
    let reporter = TerminalReporter::new(&app.output);

    let plan = time_shift::restore_time(&app.runner, &store, &reporter, &options(&config)).await?;

    let event = AuditEvent::new("time", &current_user(), "restore", "system_clock", "success");
    config_service::record_audit(&app.audit_log(&config), &config, &event);

    if app.is_json() {
        app.renderer()
            .render_value(&json!({ "restored": true, "plan": plan }))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Run a `timeshift time` subcommand.
///
/// # Errors
///
/// Returns an error if the clock cannot be read or the expiry date is
/// malformed.
pub async fn run(app: &AppContext, cmd: TimeCommand) -> Result<ExitCode> {
    match cmd {
        TimeCommand::Status => {
            let config = app.config()?;
            let status = time_shift::time_status(&app.runner, &backup_store(&config)).await?;
            app.renderer().render_time_status(&status)?;
            Ok(ExitCode::SUCCESS)
        }
        TimeCommand::CertDate { expiry, days_before } => cert_date(app, &expiry, days_before),
    }
}

fn cert_date(app: &AppContext, expiry: &str, days_before: i64) -> Result<ExitCode> {
    let Some(target) = calculate_cert_valid_date(expiry, days_before) else {
        anyhow::bail!("Invalid expiry date '{expiry}': expected YYYY-MM-DD");
    };
    if app.is_json() {
        app.renderer().render_value(&json!({
            "expiry": expiry,
            "days_before": days_before,
            "target_date": target,
        }))?;
    } else {
        println!("{target}");
        app.output
            .info(&format!("Run: timeshift shift --target-date {target}"));
    }
    Ok(ExitCode::SUCCESS)
}
