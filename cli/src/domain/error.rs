//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Validation errors ─────────────────────────────────────────────────────────

/// Errors raised by the input validators.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} too long: {len} characters (max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Command contains forbidden pattern '{pattern}'")]
    ForbiddenPattern { pattern: String },

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}

// ── Time shift errors ─────────────────────────────────────────────────────────

/// Errors from the clock shift/restore sequence.
#[derive(Debug, Error)]
pub enum TimeShiftError {
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Target date {target} is {days} days away (limit {limit}). Raise time.max_shift_days to allow it.")]
    ShiftTooLarge {
        target: String,
        days: i64,
        limit: u32,
    },

    #[error("Could not back up current time: {0}")]
    BackupFailed(String),

    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Time shift failed ({cause}); original time was restored")]
    RolledBack { cause: String },

    #[error("Time shift failed ({cause}) and restore also failed ({restore}). Run 'timeshift restore' manually.")]
    RollbackFailed { cause: String, restore: String },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },

    #[error("Configuration is invalid:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

// ── Plugin errors ─────────────────────────────────────────────────────────────

/// Errors raised by the plugin manager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("Plugin '{0}' not found")]
    NotFound(String),

    #[error("Plugin '{name}' is not active (status: {status})")]
    NotActive { name: String, status: String },

    #[error("Plugin '{name}' cannot handle action '{action}'")]
    UnsupportedAction { name: String, action: String },

    #[error("Invalid configuration for plugin '{name}': missing {missing}")]
    InvalidConfig { name: String, missing: String },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Plugin '{plugin}' depends on unknown plugin '{dependency}'")]
    MissingDependency { plugin: String, dependency: String },

    #[error("Plugin '{name}' failed to initialize: {reason}")]
    InitFailed { name: String, reason: String },
}

// ── Template errors ───────────────────────────────────────────────────────────

/// Errors raised while rendering configuration templates.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Template '{template}' references undefined variable '{variable}'")]
    UndefinedVariable { template: String, variable: String },

    #[error("Variable '{variable}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        variable: String,
        value: String,
        min: i64,
        max: i64,
    },

    #[error("Unsupported format '{0}'")]
    UnknownFormat(String),

    #[error("Template '{template}' rendered invalid output: {reason}")]
    InvalidOutput { template: String, reason: String },
}

// ── Proxmox errors ────────────────────────────────────────────────────────────

/// Errors returned by the Proxmox API client.
#[derive(Debug, Error)]
pub enum ProxmoxError {
    #[error("Proxmox API returned HTTP {status} for {path}: {body}")]
    Http {
        status: u16,
        path: String,
        body: String,
    },

    #[error("Proxmox response for {0} has no 'data' field")]
    MissingData(String),

    #[error("Proxmox API token is not configured (set proxmox.token_id and proxmox.token_secret)")]
    MissingToken,
}
