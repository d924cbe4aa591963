//! Domain types and validators for timeshift configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::ConfigError;
use crate::domain::time::DEFAULT_BACKUP_PATH;
use crate::domain::validate::{validate_host, validate_ip_address, validate_proxmox_node};

// ── Constants ────────────────────────────────────────────────────────────────

pub const CONFIG_VERSION: &str = "0.2.0";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/time-shift-config.json";

/// Secrets that are refused outright.
pub const WEAK_SECRETS: &[&str] = &["password", "12345678", "admin123", "change_me", "admin"];

static VM_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9-]+$").expect("valid regex")
});

static LOG_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^\d+[KMGT]?B?$").expect("valid regex")
});

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `/etc/time-shift-config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeShiftConfig {
    pub proxmox: ProxmoxConfig,
    pub vm: VmConfig,
    pub network: NetworkConfig,
    pub time: TimeConfig,
    pub idrac: IdracConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for TimeShiftConfig {
    fn default() -> Self {
        Self {
            proxmox: ProxmoxConfig::default(),
            vm: VmConfig::default(),
            network: NetworkConfig::default(),
            time: TimeConfig::default(),
            idrac: IdracConfig::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
            version: CONFIG_VERSION.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Proxmox VE API connection. Authentication uses an API token
/// (`user@realm!tokenid`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxmoxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub token_id: String,
    pub token_secret: String,
    pub node: String,
    pub verify_ssl: bool,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ProxmoxConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 8006,
            username: "root@pam".to_string(),
            token_id: String::new(),
            token_secret: String::new(),
            node: "proxmox-node".to_string(),
            verify_ssl: false,
            timeout: 30,
        }
    }
}

impl ProxmoxConfig {
    /// `true` once both token fields are filled in.
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token_id.is_empty() && !self.token_secret.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    #[default]
    L26,
    L24,
    Win,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VmConfig {
    pub name: String,
    /// Memory in MB.
    pub memory: u32,
    pub cores: u32,
    /// Disk size in GB.
    pub disk_size: u32,
    pub os_type: OsType,
    pub template: Option<String>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            name: "time-shift-vm".to_string(),
            memory: 2048,
            cores: 2,
            disk_size: 20,
            os_type: OsType::default(),
            template: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IpConfig {
    #[default]
    Dhcp,
    Static,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub bridge: String,
    pub ip_config: IpConfig,
    pub ip_address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    pub dns_servers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bridge: "vmbr0".to_string(),
            ip_config: IpConfig::default(),
            ip_address: None,
            netmask: None,
            gateway: None,
            dns_servers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeConfig {
    pub timezone: String,
    pub ntp_servers: Vec<String>,
    pub backup_original: bool,
    pub max_shift_days: u32,
    pub auto_restore_hours: u32,
    /// Prefix privileged clock commands with `sudo`.
    pub use_sudo: bool,
    pub backup_file: PathBuf,
    /// Seconds to wait after re-enabling NTP.
    pub ntp_settle_seconds: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            ntp_servers: vec!["pool.ntp.org".to_string(), "time.nist.gov".to_string()],
            backup_original: true,
            max_shift_days: 3650,
            auto_restore_hours: 24,
            use_sudo: true,
            backup_file: PathBuf::from(DEFAULT_BACKUP_PATH),
            ntp_settle_seconds: 2,
        }
    }
}

/// iDRAC access defaults. `root`/`calvin` are Dell's factory credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdracConfig {
    pub default_username: String,
    pub default_password: String,
    pub ssl_verify: bool,
    pub timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay: u64,
}

impl Default for IdracConfig {
    fn default() -> Self {
        Self {
            default_username: "root".to_string(),
            default_password: "calvin".to_string(),
            ssl_verify: false,
            timeout: 30,
            retry_attempts: 3,
            retry_delay: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Equivalent `tracing` filter directive.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    pub max_size: String,
    pub backup_count: u32,
    pub console_output: bool,
    /// Emit JSON log lines instead of the compact text format.
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file: Some(PathBuf::from("/var/log/time-shift/time-shift.log")),
            max_size: "10MB".to_string(),
            backup_count: 5,
            console_output: true,
            structured: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    pub allow_root: bool,
    pub require_confirmation: bool,
    pub api_key_length: u32,
    pub session_timeout: u32,
    pub max_login_attempts: u32,
    pub lockout_duration: u32,
    pub audit_log: bool,
    pub audit_log_file: PathBuf,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_root: false,
            require_confirmation: true,
            api_key_length: 32,
            session_timeout: 3600,
            max_login_attempts: 3,
            lockout_duration: 300,
            audit_log: true,
            audit_log_file: PathBuf::from("/var/log/time-shift/security.log"),
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

fn check_range(
    errors: &mut Vec<String>,
    key: &str,
    value: impl Into<i64>,
    min: i64,
    max: i64,
) {
    let value = value.into();
    if !(min..=max).contains(&value) {
        errors.push(format!("{key} must be between {min} and {max} (got {value})"));
    }
}

/// Accepts a prefix length (`24`) or a contiguous dotted mask (`255.255.255.0`).
#[must_use]
pub fn is_valid_netmask(mask: &str) -> bool {
    if let Ok(prefix) = mask.parse::<u8>() {
        return prefix <= 32;
    }
    let Ok(addr) = mask.parse::<Ipv4Addr>() else {
        return false;
    };
    let bits = u32::from(addr);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

impl TimeShiftConfig {
    /// Collect every schema violation. An empty list means the config is valid.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.check_proxmox(&mut errors);
        self.check_vm(&mut errors);
        self.check_network(&mut errors);
        self.check_time(&mut errors);
        self.check_idrac(&mut errors);
        self.check_logging(&mut errors);
        self.check_security(&mut errors);
        errors
    }

    /// Validate the whole document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` listing every violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = self.violations();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    fn check_proxmox(&self, errors: &mut Vec<String>) {
        let p = &self.proxmox;
        if let Err(e) = validate_host(&p.host) {
            errors.push(format!("proxmox.host: {e}"));
        }
        if p.port == 0 {
            errors.push("proxmox.port must be between 1 and 65535 (got 0)".to_string());
        }
        if !p.username.contains('@') {
            errors.push("proxmox.username must include realm (e.g., root@pam)".to_string());
        }
        if let Err(e) = validate_proxmox_node(&p.node) {
            errors.push(format!("proxmox.node: {e}"));
        }
        if !p.token_secret.is_empty() {
            if p.token_secret.chars().count() < 8 {
                errors.push("proxmox.token_secret must be at least 8 characters long".to_string());
            } else if WEAK_SECRETS.contains(&p.token_secret.to_lowercase().as_str()) {
                errors.push("proxmox.token_secret is too weak".to_string());
            }
        }
        check_range(
            errors,
            "proxmox.timeout",
            i64::try_from(p.timeout).unwrap_or(i64::MAX),
            5,
            300,
        );
    }

    fn check_vm(&self, errors: &mut Vec<String>) {
        let vm = &self.vm;
        if vm.name.is_empty() || vm.name.len() > 15 {
            errors.push(format!(
                "vm.name must be 1 to 15 characters (got {})",
                vm.name.len()
            ));
        } else if !VM_NAME_RE.is_match(&vm.name) {
            errors.push("vm.name can only contain letters, numbers, and hyphens".to_string());
        }
        check_range(errors, "vm.memory", vm.memory, 512, 32768);
        check_range(errors, "vm.cores", vm.cores, 1, 32);
        check_range(errors, "vm.disk_size", vm.disk_size, 10, 1000);
    }

    fn check_network(&self, errors: &mut Vec<String>) {
        let net = &self.network;
        if net.bridge.trim().is_empty() {
            errors.push("network.bridge cannot be empty".to_string());
        }
        match (&net.ip_config, &net.ip_address) {
            (IpConfig::Static, None) => {
                errors.push("network.ip_address is required for static IP configuration".to_string());
            }
            (_, Some(ip)) if validate_ip_address(ip).is_err() => {
                errors.push(format!("network.ip_address is not a valid IP address: {ip}"));
            }
            _ => {}
        }
        if let Some(mask) = &net.netmask {
            if !is_valid_netmask(mask) {
                errors.push(format!("network.netmask is invalid: {mask}"));
            }
        }
        if let Some(gw) = &net.gateway {
            if validate_ip_address(gw).is_err() {
                errors.push(format!("network.gateway is not a valid IP address: {gw}"));
            }
        }
        for dns in &net.dns_servers {
            if validate_host(dns).is_err() {
                errors.push(format!("network.dns_servers contains invalid entry: {dns}"));
            }
        }
    }

    fn check_time(&self, errors: &mut Vec<String>) {
        let t = &self.time;
        if t.ntp_servers.is_empty() {
            errors.push("time.ntp_servers requires at least one NTP server".to_string());
        }
        if t.timezone.trim().is_empty() {
            errors.push("time.timezone cannot be empty".to_string());
        }
        check_range(errors, "time.max_shift_days", t.max_shift_days, 1, 7300);
        check_range(errors, "time.auto_restore_hours", t.auto_restore_hours, 1, 168);
    }

    fn check_idrac(&self, errors: &mut Vec<String>) {
        let i = &self.idrac;
        check_range(
            errors,
            "idrac.timeout",
            i64::try_from(i.timeout).unwrap_or(i64::MAX),
            5,
            120,
        );
        check_range(errors, "idrac.retry_attempts", i.retry_attempts, 1, 10);
        check_range(
            errors,
            "idrac.retry_delay",
            i64::try_from(i.retry_delay).unwrap_or(i64::MAX),
            1,
            60,
        );
    }

    fn check_logging(&self, errors: &mut Vec<String>) {
        let l = &self.logging;
        if !LOG_SIZE_RE.is_match(&l.max_size.to_uppercase()) {
            errors.push(format!(
                "logging.max_size '{}' is invalid. Use a size like \"10MB\" or \"1GB\"",
                l.max_size
            ));
        }
        check_range(errors, "logging.backup_count", l.backup_count, 1, 50);
    }

    fn check_security(&self, errors: &mut Vec<String>) {
        let s = &self.security;
        check_range(errors, "security.api_key_length", s.api_key_length, 16, 128);
        check_range(errors, "security.session_timeout", s.session_timeout, 300, 86400);
        check_range(errors, "security.max_login_attempts", s.max_login_attempts, 1, 10);
        check_range(errors, "security.lockout_duration", s.lockout_duration, 60, 3600);
    }

    /// Non-fatal security findings about an otherwise valid config.
    #[must_use]
    pub fn security_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.proxmox.has_token() {
            warnings.push("Proxmox API token is not configured".to_string());
        } else if WEAK_SECRETS.contains(&self.proxmox.token_secret.to_lowercase().as_str()) {
            warnings.push("Proxmox token secret appears to be weak or default".to_string());
        }
        if self.idrac.default_password == "calvin" {
            warnings.push("Using default iDRAC password".to_string());
        }
        if !self.proxmox.verify_ssl {
            warnings.push("SSL verification disabled for Proxmox".to_string());
        }
        if !self.idrac.ssl_verify {
            warnings.push("SSL verification disabled for iDRAC".to_string());
        }
        if self.security.allow_root {
            warnings.push("Root access is enabled".to_string());
        }
        if !self.security.require_confirmation {
            warnings.push("Operation confirmation is disabled".to_string());
        }
        warnings
    }

    /// Set a dotted key (`time.max_shift_days`) from its string form.
    ///
    /// The new value is parsed according to the type of the current value:
    /// booleans accept `true/false/yes/no/1/0`, lists are comma separated and
    /// `null` clears optional fields. The result is re-validated.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownKey` for keys outside the schema and
    /// `ConfigError::InvalidValue` when the value does not fit the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut doc = serde_json::to_value(&*self).map_err(|e| invalid(key, value, &e.to_string()))?;
        let slot = lookup_mut(&mut doc, key).ok_or_else(|| ConfigError::UnknownKey {
            key: key.to_string(),
            valid: settable_keys(self).join(", "),
        })?;
        *slot = coerce_value(slot, value).ok_or_else(|| invalid(key, value, "a value of the same type"))?;

        let updated: TimeShiftConfig =
            serde_json::from_value(doc).map_err(|e| invalid(key, value, &e.to_string()))?;
        let errors: Vec<String> = updated
            .violations()
            .into_iter()
            .filter(|e| e.starts_with(key))
            .collect();
        if !errors.is_empty() {
            return Err(invalid(key, value, &errors.join("; ")));
        }
        *self = updated;
        Ok(())
    }

    /// Read a dotted key as JSON.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut doc = serde_json::to_value(self).ok()?;
        lookup_mut(&mut doc, key).map(|v| v.take())
    }

    /// The config as JSON with non-empty secrets replaced by `********`.
    #[must_use]
    pub fn redacted(&self) -> Value {
        let mut doc = serde_json::to_value(self).unwrap_or(Value::Null);
        for key in ["proxmox.token_secret", "idrac.default_password"] {
            if let Some(slot) = lookup_mut(&mut doc, key) {
                if slot.as_str().is_some_and(|s| !s.is_empty()) {
                    *slot = Value::String(REDACTED.to_string());
                }
            }
        }
        doc
    }
}

const REDACTED: &str = "********";

fn invalid(key: &str, value: &str, valid: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        valid: valid.to_string(),
    }
}

fn lookup_mut<'a>(doc: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    let mut cur = doc;
    for part in key.split('.') {
        cur = cur.as_object_mut()?.get_mut(part)?;
    }
    // Only leaves are settable; sections are replaced key by key.
    (!cur.is_object()).then_some(cur)
}

fn coerce_value(current: &Value, raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw == "null" {
        return Some(Value::Null);
    }
    match current {
        Value::Bool(_) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(Value::Bool(true)),
            "false" | "no" | "0" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(_) => raw.parse::<u64>().ok().map(Value::from),
        Value::Array(_) => Some(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        Value::String(_) | Value::Null | Value::Object(_) => Some(Value::String(raw.to_string())),
    }
}

/// Every dotted leaf key in the config document.
#[must_use]
pub fn settable_keys(config: &TimeShiftConfig) -> Vec<String> {
    fn walk(prefix: &str, v: &Value, out: &mut Vec<String>) {
        if let Value::Object(map) = v {
            for (k, child) in map {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                if child.is_object() {
                    walk(&path, child, out);
                } else {
                    out.push(path);
                }
            }
        }
    }
    let mut keys = Vec::new();
    if let Ok(doc) = serde_json::to_value(config) {
        walk("", &doc, &mut keys);
    }
    keys.retain(|k| !matches!(k.as_str(), "version" | "created_at" | "updated_at"));
    keys.sort();
    keys
}

// ── Unit tests ───────────────────────────────────────────────────────────────
