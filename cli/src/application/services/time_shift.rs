//! Application service: shift the system clock and put it back.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Every shell-out goes through the injected `CommandRunner`.

use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use timeshift_common::TimeBackup;
use tracing::{debug, error, info, warn};

use crate::application::ports::{CommandRunner, ProgressReporter, TimeBackupStore};
use crate::domain::error::TimeShiftError;
use crate::domain::time::{
    RestorePlan, TimeStatus, check_shift_window, new_backup, ntp_flag, parse_timedatectl_property,
    plan_restore, shift_timestamp, validate_date_format,
};

/// Knobs for the privileged part of the sequence.
#[derive(Debug, Clone, Copy)]
pub struct TimeOptions {
    /// Prefix `timedatectl`, `date` and `hwclock` with `sudo`.
    pub use_sudo: bool,
    pub max_shift_days: u32,
    /// Wait after re-enabling NTP so the first sync can land.
    pub settle: Duration,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self {
            use_sudo: true,
            max_shift_days: 3650,
            settle: Duration::from_secs(2),
        }
    }
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Run a privileged command, failing on a non-zero exit.
async fn run_privileged(
    runner: &impl CommandRunner,
    opts: &TimeOptions,
    program: &str,
    args: &[&str],
) -> Result<Output, TimeShiftError> {
    let command = format!("{program} {}", args.join(" "));
    let result = if opts.use_sudo {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(program);
        full.extend_from_slice(args);
        runner.run("sudo", &full).await
    } else {
        runner.run(program, args).await
    };

    match result {
        Ok(output) if output.status.success() => {
            debug!(%command, "command succeeded");
            Ok(output)
        }
        Ok(output) => Err(TimeShiftError::CommandFailed {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
        Err(e) => Err(TimeShiftError::CommandFailed {
            command,
            stderr: format!("{e:#}"),
        }),
    }
}

/// Numeric effective uid from `id -u`, if it can be determined.
pub async fn effective_uid(runner: &impl CommandRunner) -> Option<u32> {
    let output = runner.run("id", &["-u"]).await.ok()?;
    if !output.status.success() {
        return None;
    }
    stdout_of(&output).parse().ok()
}

/// Wall-clock time as `YYYY-MM-DD HH:MM:SS`.
///
/// # Errors
///
/// Returns an error if `date` cannot be run.
pub async fn current_time(runner: &impl CommandRunner) -> Result<String> {
    let output = runner
        .run("date", &["+%Y-%m-%d %H:%M:%S"])
        .await
        .context("reading current time")?;
    if !output.status.success() {
        anyhow::bail!(
            "date exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(stdout_of(&output))
}

async fn timedatectl_property(runner: &impl CommandRunner, property: &str) -> Option<String> {
    let arg = format!("--property={property}");
    let output = runner.run("timedatectl", &["show", &arg]).await.ok()?;
    if !output.status.success() {
        return None;
    }
    parse_timedatectl_property(&stdout_of(&output), property)
}

/// `true` when `timedatectl` reports NTP on. Any failure reads as off.
pub async fn is_ntp_enabled(runner: &impl CommandRunner) -> bool {
    timedatectl_property(runner, "NTP")
        .await
        .is_some_and(|v| ntp_flag(&v))
}

/// Record the current time, timezone and NTP state.
///
/// # Errors
///
/// Returns `TimeShiftError::BackupFailed` if the time cannot be read or the
/// record cannot be written.
pub async fn backup_current_time(
    runner: &impl CommandRunner,
    store: &impl TimeBackupStore,
) -> Result<TimeBackup> {
    let now = current_time(runner)
        .await
        .map_err(|e| TimeShiftError::BackupFailed(format!("{e:#}")))?;
    let timezone = timedatectl_property(runner, "Timezone")
        .await
        .unwrap_or_else(|| "UTC".to_string());
    let ntp = is_ntp_enabled(runner).await;

    let backup = new_backup(&now, &timezone, ntp, Utc::now());
    store
        .save(&backup)
        .await
        .map_err(|e| TimeShiftError::BackupFailed(format!("{e:#}")))?;
    info!(timestamp = %backup.timestamp, timezone = %backup.timezone, ntp, "time backed up");
    Ok(backup)
}

/// Shift the clock to noon on `target_date`.
///
/// Backs up first, then disables NTP, sets the date and syncs the hardware
/// clock. If any of those three steps fails the clock is restored from the
/// backup before the error is returned.
///
/// A backup left by an earlier shift is kept as is, so a later `restore`
/// still returns to the time recorded before the first shift.
///
/// # Errors
///
/// - `TimeShiftError::InvalidDate` / `ShiftTooLarge` before anything runs.
/// - `TimeShiftError::BackupFailed` if the backup cannot be read or taken.
/// - `TimeShiftError::RolledBack` when a step failed and restore succeeded.
/// - `TimeShiftError::RollbackFailed` when restore failed too.
pub async fn shift_time(
    runner: &impl CommandRunner,
    store: &impl TimeBackupStore,
    reporter: &impl ProgressReporter,
    opts: &TimeOptions,
    target_date: &str,
    today: NaiveDate,
) -> Result<TimeBackup> {
    let target = validate_date_format(target_date)?;
    check_shift_window(target, today, opts.max_shift_days)?;

    let pending = store
        .load()
        .await
        .map_err(|e| TimeShiftError::BackupFailed(format!("{e:#}")))?;
    let backup = if let Some(pending) = pending {
        warn!(timestamp = %pending.timestamp, "shift already pending, keeping its backup");
        reporter.warn(&format!(
            "keeping the pending backup from {} (clock already shifted)",
            pending.timestamp
        ));
        pending
    } else {
        reporter.step("backing up current time...");
        backup_current_time(runner, store).await?
    };

    reporter.step(&format!("shifting clock to {target}..."));
    if let Err(cause) = apply_shift(runner, opts, target).await {
        error!(%cause, "time shift failed, restoring");
        reporter.warn("shift failed, restoring original time");
        return match restore_time(runner, store, reporter, opts).await {
            Ok(_) => Err(TimeShiftError::RolledBack {
                cause: cause.to_string(),
            }
            .into()),
            Err(restore) => Err(TimeShiftError::RollbackFailed {
                cause: cause.to_string(),
                restore: format!("{restore:#}"),
            }
            .into()),
        };
    }

    info!(%target, "time shifted");
    reporter.success(&format!("clock set to {}", shift_timestamp(target)));
    Ok(backup)
}

async fn apply_shift(
    runner: &impl CommandRunner,
    opts: &TimeOptions,
    target: NaiveDate,
) -> Result<(), TimeShiftError> {
    run_privileged(runner, opts, "timedatectl", &["set-ntp", "false"]).await?;
    let stamp = shift_timestamp(target);
    run_privileged(runner, opts, "date", &["-s", &stamp]).await?;
    run_privileged(runner, opts, "hwclock", &["--systohc"]).await?;
    Ok(())
}

/// Put the clock back according to the stored backup, then drop the backup.
///
/// # Errors
///
/// Returns an error if a restore command fails or the backup cannot be
/// read. The backup is kept on failure so a retry can use it.
pub async fn restore_time(
    runner: &impl CommandRunner,
    store: &impl TimeBackupStore,
    reporter: &impl ProgressReporter,
    opts: &TimeOptions,
) -> Result<RestorePlan> {
    let backup = store.load().await.context("reading time backup")?;
    let plan = plan_restore(backup.as_ref());

    match &plan {
        RestorePlan::EnableNtpOnly => {
            warn!("no time backup found, re-enabling NTP");
            reporter.step("no backup found, enabling NTP...");
            run_privileged(runner, opts, "timedatectl", &["set-ntp", "true"]).await?;
        }
        RestorePlan::EnableNtpAndSettle => {
            reporter.step("re-enabling NTP...");
            run_privileged(runner, opts, "timedatectl", &["set-ntp", "true"]).await?;
            if !opts.settle.is_zero() {
                tokio::time::sleep(opts.settle).await;
            }
        }
        RestorePlan::SetClock { timestamp } => {
            reporter.step(&format!("restoring clock to {timestamp}..."));
            run_privileged(runner, opts, "date", &["-s", timestamp]).await?;
            run_privileged(runner, opts, "hwclock", &["--systohc"]).await?;
        }
    }

    if backup.is_some() {
        store.clear().await.context("removing time backup")?;
    }
    info!(?plan, "time restored");
    reporter.success("original time restored");
    Ok(plan)
}

/// Current clock state plus any pending backup.
///
/// # Errors
///
/// Returns an error if the time or the backup cannot be read.
pub async fn time_status(
    runner: &impl CommandRunner,
    store: &impl TimeBackupStore,
) -> Result<TimeStatus> {
    let (current, timezone, ntp, backup) = tokio::join!(
        current_time(runner),
        timedatectl_property(runner, "Timezone"),
        is_ntp_enabled(runner),
        store.load(),
    );
    Ok(TimeStatus {
        current_time: current?,
        timezone,
        ntp_enabled: ntp,
        pending_backup: backup.context("reading time backup")?,
    })
}
