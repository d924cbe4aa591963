//! Pure clock-shift logic: date parsing, shift limits, backup records and
//! restore planning.
//!
//! No I/O. The shell-out sequence lives in
//! `application::services::time_shift`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use timeshift_common::TimeBackup;

use crate::domain::error::TimeShiftError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default backup location. Lives in `/tmp` so a reboot discards it along
/// with the shifted clock.
pub const DEFAULT_BACKUP_PATH: &str = "/tmp/original_time_backup.json";

/// Shifted clocks are set to noon so a timezone offset never rolls the
/// date over.
pub const SHIFT_TIME_OF_DAY: &str = "12:00:00";

/// Days subtracted from a certificate's expiry by `cert-date`.
pub const DEFAULT_CERT_MARGIN_DAYS: i64 = 30;

/// Parse a strict `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns `TimeShiftError::InvalidDate` if the string does not parse.
pub fn validate_date_format(date: &str) -> Result<NaiveDate, TimeShiftError> {
    let trimmed = date.trim();
    // chrono accepts single-digit months/days for %m/%d; require the padded form.
    if trimmed.len() != 10 {
        return Err(TimeShiftError::InvalidDate(date.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| TimeShiftError::InvalidDate(date.to_string()))
}

/// Date a certificate was still valid: `days_before` days before `expiry`.
///
/// Returns `None` when `expiry` is not a `YYYY-MM-DD` date or the offset
/// falls outside the calendar.
#[must_use]
pub fn calculate_cert_valid_date(expiry: &str, days_before: i64) -> Option<String> {
    let expiry = validate_date_format(expiry).ok()?;
    let valid = expiry.checked_sub_signed(Duration::try_days(days_before)?)?;
    Some(valid.format(DATE_FORMAT).to_string())
}

/// Refuse shifts further than `max_days` away from `today` in either
/// direction.
///
/// # Errors
///
/// Returns `TimeShiftError::ShiftTooLarge` when the limit is exceeded.
pub fn check_shift_window(
    target: NaiveDate,
    today: NaiveDate,
    max_days: u32,
) -> Result<(), TimeShiftError> {
    let days = (target - today).num_days().abs();
    if days > i64::from(max_days) {
        return Err(TimeShiftError::ShiftTooLarge {
            target: target.format(DATE_FORMAT).to_string(),
            days,
            limit: max_days,
        });
    }
    Ok(())
}

/// Argument passed to `date -s` when shifting to `target`.
#[must_use]
pub fn shift_timestamp(target: NaiveDate) -> String {
    format!("{} {SHIFT_TIME_OF_DAY}", target.format(DATE_FORMAT))
}

/// Extract the value of `Property=value` from `timedatectl show` output.
#[must_use]
pub fn parse_timedatectl_property(output: &str, property: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        (key == property).then(|| value.trim().to_string())
    })
}

/// `timedatectl` reports NTP as `yes`/`no`.
#[must_use]
pub fn ntp_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("yes")
}

/// Build the backup record written before a shift.
#[must_use]
pub fn new_backup(
    timestamp: &str,
    timezone: &str,
    ntp_enabled: bool,
    created: DateTime<Utc>,
) -> TimeBackup {
    TimeBackup {
        timestamp: timestamp.trim().to_string(),
        timezone: timezone.trim().to_string(),
        ntp_enabled,
        backup_created: created.to_rfc3339(),
    }
}

/// How `restore` puts the clock back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RestorePlan {
    /// No backup on disk: just turn NTP back on.
    EnableNtpOnly,
    /// Backup taken while NTP was on: turn it back on and let it settle.
    EnableNtpAndSettle,
    /// Backup taken with NTP off: write the saved wall-clock time back.
    SetClock { timestamp: String },
}

#[must_use]
pub fn plan_restore(backup: Option<&TimeBackup>) -> RestorePlan {
    match backup {
        None => RestorePlan::EnableNtpOnly,
        Some(b) if b.ntp_enabled => RestorePlan::EnableNtpAndSettle,
        Some(b) => RestorePlan::SetClock {
            timestamp: b.timestamp.clone(),
        },
    }
}

/// Current clock state, as shown by `timeshift time status`.
#[derive(Debug, Clone, Serialize)]
pub struct TimeStatus {
    pub current_time: String,
    pub timezone: Option<String>,
    pub ntp_enabled: bool,
    /// Present while a shift is in effect.
    pub pending_backup: Option<TimeBackup>,
}
