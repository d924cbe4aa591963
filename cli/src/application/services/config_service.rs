//! Application service: configuration use-cases.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::application::ports::{AuditSink, ConfigStore};
use crate::domain::TimeShiftConfig;
use crate::domain::audit::{AuditEvent, AuditReport, audit_config};

/// Load configuration.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(store: &impl ConfigStore) -> Result<TimeShiftConfig> {
    store.load()
}

/// Validate, stamp `updated_at` and save.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` listing every violation, or a write error.
pub fn save_config(store: &impl ConfigStore, config: &mut TimeShiftConfig) -> Result<()> {
    config.validate()?;
    config.updated_at = Some(Utc::now());
    store.save(config)?;
    info!(path = %store.path().display(), "configuration saved");
    Ok(())
}

/// Write a default configuration. Refuses to overwrite unless `force`.
///
/// # Errors
///
/// Returns an error if the file exists and `force` is false, or on write
/// failure.
pub fn create_default_config(store: &impl ConfigStore, force: bool) -> Result<TimeShiftConfig> {
    if !force && store.load_raw()?.is_some() {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            store.path().display()
        );
    }
    let config = TimeShiftConfig::default();
    store.save(&config)?;
    Ok(config)
}

/// Set one dotted key, validate and save.
///
/// # Errors
///
/// Returns `ConfigError` for unknown keys or invalid values.
pub fn set_config_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<TimeShiftConfig> {
    let mut config = store.load()?;
    config.set(key, value)?;
    save_config(store, &mut config)?;
    Ok(config)
}

/// Audit the stored document, or the defaults when none exists.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn audit_configuration(store: &impl ConfigStore) -> Result<AuditReport> {
    let raw = match store.load_raw()? {
        Some(raw) => raw,
        None => serde_json::to_value(TimeShiftConfig::default()).context("serializing defaults")?,
    };
    Ok(audit_config(&raw))
}

/// Append to the audit log when `security.audit_log` is on. Write failures
/// are logged, never returned.
pub fn record_audit(sink: &impl AuditSink, config: &TimeShiftConfig, event: &AuditEvent) {
    if !config.security.audit_log {
        return;
    }
    if let Err(e) = sink.record(event) {
        warn!(error = %e, "could not write audit log");
    }
}
