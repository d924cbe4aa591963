//! Configuration templates: definitions, placeholder rendering and
//! per-format content checks.
//!
//! Placeholders are `{{ name }}` or dotted `{{ resources.limits.cpu }}`.
//! There are no loops or conditionals; list and map values render as
//! inline JSON, which is also valid YAML flow syntax.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::domain::error::TemplateError;

pub const GENERATED_BY: &str = "Timeshift Config Template Engine";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}").expect("valid regex")
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Yaml,
    Env,
    Ini,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Env => "env",
            Self::Ini => "ini",
            Self::Toml => "toml",
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "env" => Ok(Self::Env),
            "ini" => Ok(Self::Ini),
            "toml" => Ok(Self::Toml),
            other => Err(TemplateError::UnknownFormat(other.to_string())),
        }
    }
}

/// Inclusive numeric range a variable must fall in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeRule {
    pub variable: String,
    pub min: i64,
    pub max: i64,
}

impl RangeRule {
    fn new(variable: &str, min: i64, max: i64) -> Self {
        Self {
            variable: variable.to_string(),
            min,
            max,
        }
    }
}

/// A renderable template.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigTemplate {
    pub name: String,
    pub description: String,
    pub format: ConfigFormat,
    #[serde(skip)]
    pub body: String,
    pub defaults: Map<String, Value>,
    pub validators: Vec<RangeRule>,
    /// Rendered files are written with mode 0600.
    pub sensitive: bool,
}

impl ConfigTemplate {
    /// Placeholder names referenced by the body, in order of first use.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for cap in PLACEHOLDER_RE.captures_iter(&self.body) {
            let name = cap[1].to_string();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// File name used when writing this template into a config set.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.format.extension())
    }
}

/// Built-in template definition; the body is looked up by `file`.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub format: ConfigFormat,
    pub file: &'static str,
    pub defaults: Value,
    pub validators: Vec<RangeRule>,
    pub sensitive: bool,
}

impl TemplateSpec {
    #[must_use]
    pub fn with_body(self, body: String) -> ConfigTemplate {
        ConfigTemplate {
            name: self.name.to_string(),
            description: self.description.to_string(),
            format: self.format,
            body,
            defaults: match self.defaults {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            validators: self.validators,
            sensitive: self.sensitive,
        }
    }
}

/// Definitions of the templates that ship with the binary.
#[must_use]
pub fn builtin_specs() -> Vec<TemplateSpec> {
    vec![
        TemplateSpec {
            name: "proxmox",
            description: "Proxmox VE connection configuration",
            format: ConfigFormat::Json,
            file: "proxmox.json.tmpl",
            defaults: json!({
                "proxmox_host": "192.168.1.100",
                "proxmox_port": 8006,
                "proxmox_username": "root@pam",
                "proxmox_token_id": "",
                "proxmox_token_secret": "",
                "proxmox_node": "pve",
                "verify_ssl": false,
                "timeout": 30,
                "vm_cores": 2,
                "vm_memory": 2048,
                "vm_disk_size": 20,
                "network_bridge": "vmbr0",
                "network_model": "virtio"
            }),
            validators: vec![
                RangeRule::new("vm_cores", 1, 128),
                RangeRule::new("vm_memory", 512, 262_144),
                RangeRule::new("vm_disk_size", 1, 1000),
            ],
            sensitive: true,
        },
        TemplateSpec {
            name: "docker-compose",
            description: "Docker Compose configuration",
            format: ConfigFormat::Yaml,
            file: "docker-compose.yaml.tmpl",
            defaults: json!({
                "docker_image": "timeshift/proxmox",
                "docker_tag": "latest",
                "container_name": "timeshift",
                "build_context": ".",
                "dockerfile": "Dockerfile",
                "restart_policy": "unless-stopped",
                "proxmox_host": "192.168.1.100",
                "proxmox_username": "root@pam",
                "ports": ["8080:8080"],
                "volumes": ["./etc:/app/etc:ro", "./logs:/app/logs"],
                "network_name": "timeshift-net"
            }),
            validators: Vec::new(),
            sensitive: false,
        },
        TemplateSpec {
            name: "environment",
            description: "Environment variables configuration",
            format: ConfigFormat::Env,
            file: "environment.env.tmpl",
            defaults: json!({
                "proxmox_host": "192.168.1.100",
                "proxmox_username": "root@pam",
                "proxmox_token_id": "",
                "proxmox_token_secret": "",
                "proxmox_node": "pve",
                "verify_ssl": false,
                "app_env": "production",
                "app_debug": false,
                "log_level": "INFO"
            }),
            validators: Vec::new(),
            sensitive: true,
        },
        TemplateSpec {
            name: "kubernetes",
            description: "Kubernetes deployment configuration",
            format: ConfigFormat::Yaml,
            file: "kubernetes.yaml.tmpl",
            defaults: json!({
                "app_name": "timeshift",
                "namespace": "default",
                "version": "1.0.0",
                "replicas": 1,
                "container_name": "timeshift",
                "image": "timeshift/proxmox",
                "tag": "latest",
                "image_pull_policy": "IfNotPresent",
                "container_port": 8080,
                "port_name": "http",
                "service_port": 80,
                "environment": [],
                "resources": {
                    "requests": {"memory": "256Mi", "cpu": "250m"},
                    "limits": {"memory": "512Mi", "cpu": "500m"}
                },
                "service_type": "ClusterIP"
            }),
            validators: vec![RangeRule::new("replicas", 0, 100)],
            sensitive: false,
        },
    ]
}

/// Build the render context: defaults, then caller variables, then the
/// injected `timestamp` and `generated_by`.
#[must_use]
pub fn build_context(
    template: &ConfigTemplate,
    vars: &Map<String, Value>,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let mut ctx = template.defaults.clone();
    for (k, v) in vars {
        ctx.insert(k.clone(), v.clone());
    }
    ctx.insert("timestamp".into(), Value::String(now.to_rfc3339()));
    ctx.insert("generated_by".into(), Value::String(GENERATED_BY.to_string()));
    ctx
}

/// Check every range rule whose variable is present in `ctx`.
///
/// # Errors
///
/// Returns `TemplateError::OutOfRange` for the first failing rule.
pub fn check_validators(rules: &[RangeRule], ctx: &Map<String, Value>) -> Result<(), TemplateError> {
    for rule in rules {
        let Some(value) = ctx.get(&rule.variable) else {
            continue;
        };
        let number = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()));
        let ok = number.is_some_and(|n| (rule.min..=rule.max).contains(&n));
        if !ok {
            return Err(TemplateError::OutOfRange {
                variable: rule.variable.clone(),
                value: render_value(value),
                min: rule.min,
                max: rule.max,
            });
        }
    }
    Ok(())
}

fn lookup<'a>(ctx: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut cur = ctx.get(parts.next()?)?;
    for part in parts {
        cur = match cur {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Textual form of a value inside a rendered file.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Value as spliced into a template of `format`. Strings in JSON templates
/// sit inside quoted slots and are escaped.
fn render_slot(value: &Value, format: ConfigFormat) -> String {
    match (value, format) {
        (Value::String(_), ConfigFormat::Json) => {
            let quoted = value.to_string();
            quoted[1..quoted.len() - 1].to_string()
        }
        _ => render_value(value),
    }
}

/// Render `template` with `vars`.
///
/// # Errors
///
/// Returns `TemplateError::OutOfRange` when validation is on and a rule
/// fails, `TemplateError::UndefinedVariable` for placeholders with no
/// value, or `TemplateError::InvalidOutput` when validation is on and the
/// result does not parse as the template's format.
pub fn render(
    template: &ConfigTemplate,
    vars: &Map<String, Value>,
    validate: bool,
    now: DateTime<Utc>,
) -> Result<String, TemplateError> {
    let ctx = build_context(template, vars, now);
    if validate {
        check_validators(&template.validators, &ctx)?;
    }

    let mut out = String::with_capacity(template.body.len());
    let mut last = 0;
    for cap in PLACEHOLDER_RE.captures_iter(&template.body) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let value = lookup(&ctx, name.as_str()).ok_or_else(|| TemplateError::UndefinedVariable {
            template: template.name.clone(),
            variable: name.as_str().to_string(),
        })?;
        out.push_str(&template.body[last..whole.start()]);
        out.push_str(&render_slot(value, template.format));
        last = whole.end();
    }
    out.push_str(&template.body[last..]);

    if validate {
        validate_content(&out, template.format).map_err(|reason| TemplateError::InvalidOutput {
            template: template.name.clone(),
            reason,
        })?;
    }
    Ok(out)
}

/// Syntax check of rendered or hand-written config content.
///
/// # Errors
///
/// Returns a message describing the first problem found.
pub fn validate_content(content: &str, format: ConfigFormat) -> Result<(), String> {
    match format {
        ConfigFormat::Json => serde_json::from_str::<Value>(content)
            .map(|_| ())
            .map_err(|e| format!("invalid JSON: {e}")),
        ConfigFormat::Yaml => {
            for doc in serde_yaml::Deserializer::from_str(content) {
                serde_yaml::Value::deserialize(doc).map_err(|e| format!("invalid YAML: {e}"))?;
            }
            Ok(())
        }
        ConfigFormat::Env => check_lines(content, &["#"], false),
        ConfigFormat::Ini => check_lines(content, &["#", ";"], true),
        ConfigFormat::Toml => check_lines(content, &["#"], true),
    }
}

fn check_lines(content: &str, comments: &[&str], sections: bool) -> Result<(), String> {
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || comments.iter().any(|c| line.starts_with(c)) {
            continue;
        }
        if sections && line.starts_with('[') && line.ends_with(']') {
            continue;
        }
        if !line.contains('=') {
            return Err(format!("line {}: expected KEY=VALUE, got '{line}'", n + 1));
        }
    }
    Ok(())
}
