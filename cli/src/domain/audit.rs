//! Configuration security audit and audit-log event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CREDENTIAL_MARKERS: &[&str] = &["password", "secret", "key", "token"];
const WEAK_MARKERS: &[&str] = &["password", "123456", "admin", "default", "calvin", "change_me"];
const TLS_MARKERS: &[&str] = &["ssl", "tls", "verify"];

/// Findings bucketed by severity.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AuditReport {
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl AuditReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.critical.len() + self.high.len() + self.medium.len() + self.low.len()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// Audit a raw configuration document.
///
/// Works on JSON rather than the typed config so unknown or legacy keys
/// (an old `password` field, say) are still inspected.
#[must_use]
pub fn audit_config(config: &Value) -> AuditReport {
    let mut report = AuditReport::default();
    walk(config, "", &mut report);

    if config.pointer("/proxmox/port").and_then(Value::as_u64) == Some(8006) {
        report
            .low
            .push("Using default Proxmox port (consider using non-standard port)".to_string());
    }
    // Absent means the historical default, which allowed root.
    let allow_root = config
        .pointer("/security/allow_root")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if allow_root {
        report
            .medium
            .push("Root access is allowed (consider restricting)".to_string());
    }
    report
}

fn walk(value: &Value, path: &str, report: &mut AuditReport) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        check_tls(key, child, &child_path, report);
        if let Value::String(s) = child {
            check_credential(key, s, &child_path, report);
        }
        walk(child, &child_path, report);
    }
}

fn check_credential(key: &str, value: &str, path: &str, report: &mut AuditReport) {
    let key_lc = key.to_lowercase();
    let value_lc = value.to_lowercase();
    let looks_like_credential = CREDENTIAL_MARKERS
        .iter()
        .any(|m| key_lc.contains(m) || value_lc.contains(m));
    if !looks_like_credential || value.is_empty() {
        return;
    }
    if WEAK_MARKERS.iter().any(|w| value_lc.contains(w)) {
        report
            .critical
            .push(format!("Weak credential detected at {path}"));
    } else if !value.starts_with('$') && value.chars().count() < 16 {
        report
            .high
            .push(format!("Potentially hardcoded credential at {path}"));
    }
}

fn check_tls(key: &str, value: &Value, path: &str, report: &mut AuditReport) {
    let key_lc = key.to_lowercase();
    if !TLS_MARKERS.iter().any(|m| key_lc.contains(m)) {
        return;
    }
    let disabled = match value {
        Value::Bool(b) => !b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "false" | "no" | "disabled"),
        _ => false,
    };
    if disabled {
        report
            .high
            .push(format!("SSL verification disabled at {path}"));
    }
}

/// One line of the JSON-lines security audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub user: String,
    pub action: String,
    pub resource: String,
    pub result: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(event_type: &str, user: &str, action: &str, resource: &str, result: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            user: user.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            result: result.to_string(),
            context: Map::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}
