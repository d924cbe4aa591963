//! JSON output helpers.
//!
//! Every `--json` code path prints one pretty-printed document on stdout.
//! Failures use the error object produced by [`format_error`].

use anyhow::{Context, Result};
use serde::Serialize;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Stable error code for the JSON error object, derived from the typed
/// error at the root of the chain.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    use crate::domain::error::{
        ConfigError, PluginError, ProxmoxError, TemplateError, TimeShiftError, ValidationError,
    };
    for cause in err.chain() {
        if cause.is::<ValidationError>() {
            return "VALIDATION_ERROR";
        }
        if cause.is::<TimeShiftError>() {
            return "TIME_SHIFT_ERROR";
        }
        if cause.is::<ConfigError>() {
            return "CONFIG_ERROR";
        }
        if cause.is::<PluginError>() {
            return "PLUGIN_ERROR";
        }
        if cause.is::<TemplateError>() {
            return "TEMPLATE_ERROR";
        }
        if cause.is::<ProxmoxError>() {
            return "PROXMOX_ERROR";
        }
    }
    "COMMAND_FAILED"
}

/// Serializes any value as pretty JSON to stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }
}
