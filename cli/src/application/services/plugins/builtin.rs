//! The five plugins that ship with the binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Value, json};
use timeshift_common::PluginPriority;

use super::{IntegrationPlugin, Params};
use crate::application::ports::{CommandRunner, ConfigStore, ProxmoxApi, SystemProbe};
use crate::domain::audit::audit_config;
use crate::domain::config::VmConfig;
use crate::domain::error::ValidationError;
use crate::domain::health::Thresholds;
use crate::domain::plugin::PluginMetadata;
use crate::domain::proxmox::snapshot_description;
use crate::domain::validate::{validate_github_token, validate_vm_name};

/// Everything the built-in plugins are wired to.
pub struct BuiltinPorts<R, A, S, C> {
    pub runner: Arc<R>,
    /// `None` when no API token is configured.
    pub proxmox: Option<Arc<A>>,
    pub system: Arc<S>,
    pub config_store: Arc<C>,
    pub proxmox_host: String,
    pub proxmox_node: String,
    pub vm_defaults: VmConfig,
}

/// Instantiate proxmox, docker, git, monitoring and security.
pub fn builtin_plugins<R, A, S, C>(ports: BuiltinPorts<R, A, S, C>) -> Vec<Arc<dyn IntegrationPlugin>>
where
    R: CommandRunner + Send + Sync + 'static,
    A: ProxmoxApi + Send + Sync + 'static,
    S: SystemProbe + Send + Sync + 'static,
    C: ConfigStore + Send + Sync + 'static,
{
    vec![
        Arc::new(ProxmoxPlugin::new(
            ports.proxmox,
            ports.proxmox_host,
            ports.proxmox_node,
            ports.vm_defaults,
        )),
        Arc::new(DockerPlugin::new(Arc::clone(&ports.runner))),
        Arc::new(GitPlugin::new(ports.runner)),
        Arc::new(MonitoringPlugin::new(ports.system, Thresholds::default())),
        Arc::new(SecurityPlugin::new(ports.config_store)),
    ]
}

fn metadata(
    name: &str,
    description: &str,
    priority: PluginPriority,
    capabilities: &[&str],
    config_schema: Value,
) -> PluginMetadata {
    PluginMetadata {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        author: "Timeshift".to_string(),
        description: description.to_string(),
        priority,
        dependencies: Vec::new(),
        capabilities: capabilities.iter().map(ToString::to_string).collect(),
        config_schema,
    }
}

fn param_str<'p>(params: &'p Params, key: &str) -> Option<&'p str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn param_vmid(params: &Params) -> Result<u32> {
    let value = params.get("vmid").context("missing parameter 'vmid'")?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .and_then(|n| u32::try_from(n).ok())
        .with_context(|| format!("invalid vmid: {value}"))
}

/// `{"status": "success"|"error", "output", "stderr"}` from a finished command.
async fn command_result(runner: &impl CommandRunner, program: &str, args: &[&str]) -> Result<Value> {
    let out = runner
        .run(program, args)
        .await
        .with_context(|| format!("running {program}"))?;
    Ok(json!({
        "status": if out.status.success() { "success" } else { "error" },
        "output": String::from_utf8_lossy(&out.stdout).trim_end(),
        "stderr": String::from_utf8_lossy(&out.stderr).trim_end(),
    }))
}

async fn require_binary(runner: &impl CommandRunner, program: &str) -> Result<()> {
    let out = runner
        .run(program, &["--version"])
        .await
        .with_context(|| format!("{program} is not installed"))?;
    if !out.status.success() {
        anyhow::bail!("{program} --version exited with {}", out.status);
    }
    Ok(())
}

// ── Proxmox ───────────────────────────────────────────────────────────────────

pub struct ProxmoxPlugin<A> {
    meta: PluginMetadata,
    api: Option<Arc<A>>,
    host: String,
    node: String,
    vm_defaults: VmConfig,
}

impl<A> ProxmoxPlugin<A> {
    pub fn new(api: Option<Arc<A>>, host: String, node: String, vm_defaults: VmConfig) -> Self {
        Self {
            meta: metadata(
                "proxmox",
                "Proxmox VE virtual machine management",
                PluginPriority::High,
                &["deploy", "manage", "monitor", "backup"],
                json!({
                    "type": "object",
                    "properties": {"host": {"type": "string"}, "node": {"type": "string"}},
                    "required": ["host", "node"]
                }),
            ),
            api,
            host,
            node,
            vm_defaults,
        }
    }

    fn api(&self) -> Result<&A> {
        self.api
            .as_deref()
            .context("Proxmox API token not configured")
    }
}

#[async_trait::async_trait(?Send)]
impl<A: ProxmoxApi + Send + Sync> IntegrationPlugin for ProxmoxPlugin<A> {
    fn metadata(&self) -> &PluginMetadata {
        &self.meta
    }

    fn default_config(&self) -> Params {
        let mut config = Params::new();
        config.insert("host".into(), json!(self.host));
        config.insert("node".into(), json!(self.node));
        config
    }

    async fn initialize(&self, _config: &Params) -> Result<()> {
        self.api()?.version().await?;
        Ok(())
    }

    async fn execute(&self, action: &str, params: &Params) -> Result<Value> {
        let api = self.api()?;
        match action {
            "deploy" => Ok(json!({"status": "planned", "vm": self.vm_defaults})),
            "manage" => {
                let vmid = param_vmid(params)?;
                let task = match param_str(params, "operation").unwrap_or("status") {
                    "start" => api.start_vm(vmid).await?,
                    "stop" => api.stop_vm(vmid).await?,
                    "status" => return Ok(serde_json::to_value(api.vm_status(vmid).await?)?),
                    other => anyhow::bail!("unknown manage operation '{other}' (start, stop, status)"),
                };
                Ok(json!({"status": "submitted", "task": task}))
            }
            "monitor" => {
                if params.contains_key("vmid") {
                    Ok(serde_json::to_value(api.vm_status(param_vmid(params)?).await?)?)
                } else {
                    let vms = api.list_vms().await?;
                    Ok(json!({"vms": vms}))
                }
            }
            "backup" => {
                let vmid = param_vmid(params)?;
                let default_name = format!("timeshift-{}", Utc::now().format("%Y%m%d%H%M%S"));
                let name = validate_vm_name(param_str(params, "name").unwrap_or(&default_name))?;
                let task = api
                    .create_snapshot(vmid, &name, &snapshot_description(Utc::now()))
                    .await?;
                Ok(json!({"status": "backed_up", "snapshot": name, "task": task}))
            }
            other => anyhow::bail!("proxmox plugin cannot handle '{other}'"),
        }
    }

    async fn health_check(&self) -> Result<Value> {
        let version = self.api()?.version().await?;
        Ok(json!({"status": "healthy", "plugin": "proxmox", "version": version.get("version")}))
    }
}

// ── Docker ────────────────────────────────────────────────────────────────────

pub struct DockerPlugin<R> {
    meta: PluginMetadata,
    runner: Arc<R>,
}

impl<R> DockerPlugin<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            meta: metadata(
                "docker",
                "Docker Compose deployment and container management",
                PluginPriority::High,
                &["deploy", "build", "manage", "logs"],
                json!({
                    "type": "object",
                    "properties": {"compose_file": {"type": "string", "default": "docker-compose.yml"}}
                }),
            ),
            runner,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl<R: CommandRunner + Send + Sync> IntegrationPlugin for DockerPlugin<R> {
    fn metadata(&self) -> &PluginMetadata {
        &self.meta
    }

    fn default_config(&self) -> Params {
        let mut config = Params::new();
        config.insert("compose_file".into(), json!("docker-compose.yml"));
        config
    }

    async fn initialize(&self, _config: &Params) -> Result<()> {
        require_binary(self.runner.as_ref(), "docker").await
    }

    async fn execute(&self, action: &str, params: &Params) -> Result<Value> {
        let file = param_str(params, "compose_file").unwrap_or("docker-compose.yml");
        let mut args = vec!["compose", "-f", file];
        match action {
            "deploy" => args.extend(["up", "-d"]),
            "build" => args.push("build"),
            "manage" => match param_str(params, "operation").unwrap_or("ps") {
                op @ ("ps" | "stop" | "start" | "restart" | "down") => args.push(op),
                other => anyhow::bail!("unknown manage operation '{other}' (ps, stop, start, restart, down)"),
            },
            "logs" => {
                args.extend(["logs", "--tail"]);
                args.push(param_str(params, "tail").unwrap_or("100"));
                if let Some(service) = param_str(params, "service") {
                    args.push(service);
                }
            }
            other => anyhow::bail!("docker plugin cannot handle '{other}'"),
        }
        command_result(self.runner.as_ref(), "docker", &args).await
    }
}

// ── Git ───────────────────────────────────────────────────────────────────────

pub struct GitPlugin<R> {
    meta: PluginMetadata,
    runner: Arc<R>,
}

impl<R> GitPlugin<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            meta: metadata(
                "git",
                "Git repository management",
                PluginPriority::Medium,
                &["clone", "pull", "push", "status"],
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "default": "."},
                        "remote": {"type": "string", "default": "origin"},
                        "branch": {"type": "string", "default": "main"},
                        "token": {"type": "string"}
                    }
                }),
            ),
            runner,
        }
    }
}

/// Reject values git would parse as an option.
fn git_operand<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.starts_with('-') {
        return Err(ValidationError::Invalid {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[async_trait::async_trait(?Send)]
impl<R: CommandRunner + Send + Sync> IntegrationPlugin for GitPlugin<R> {
    fn metadata(&self) -> &PluginMetadata {
        &self.meta
    }

    fn default_config(&self) -> Params {
        let mut config = Params::new();
        config.insert("path".into(), json!("."));
        config.insert("remote".into(), json!("origin"));
        config.insert("branch".into(), json!("main"));
        config
    }

    async fn initialize(&self, config: &Params) -> Result<()> {
        if let Some(token) = param_str(config, "token") {
            validate_github_token(token)?;
        }
        require_binary(self.runner.as_ref(), "git").await
    }

    async fn execute(&self, action: &str, params: &Params) -> Result<Value> {
        let path = param_str(params, "path").unwrap_or(".");
        let remote = git_operand("remote", param_str(params, "remote").unwrap_or("origin"))?;
        let branch = git_operand("branch", param_str(params, "branch").unwrap_or("main"))?;
        let runner = self.runner.as_ref();
        match action {
            "status" => command_result(runner, "git", &["-C", path, "status", "--porcelain"]).await,
            "pull" => command_result(runner, "git", &["-C", path, "pull", remote, branch]).await,
            "push" => command_result(runner, "git", &["-C", path, "push", remote, branch]).await,
            "clone" => {
                let url = param_str(params, "url").context("missing parameter 'url'")?;
                let url = git_operand("url", url)?;
                command_result(runner, "git", &["clone", "--branch", branch, "--", url, path]).await
            }
            other => anyhow::bail!("git plugin cannot handle '{other}'"),
        }
    }
}

// ── Monitoring ────────────────────────────────────────────────────────────────

pub struct MonitoringPlugin<S> {
    meta: PluginMetadata,
    system: Arc<S>,
    thresholds: Thresholds,
}

impl<S> MonitoringPlugin<S> {
    pub fn new(system: Arc<S>, thresholds: Thresholds) -> Self {
        Self {
            meta: metadata(
                "monitoring",
                "Host metrics and threshold alerts",
                PluginPriority::Medium,
                &["metrics", "alerts", "logs", "traces"],
                json!({"type": "object"}),
            ),
            system,
            thresholds,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl<S: SystemProbe + Send + Sync> IntegrationPlugin for MonitoringPlugin<S> {
    fn metadata(&self) -> &PluginMetadata {
        &self.meta
    }

    async fn initialize(&self, _config: &Params) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, action: &str, _params: &Params) -> Result<Value> {
        match action {
            "metrics" => {
                let usage = self.system.resource_usage().await?;
                Ok(json!({
                    "cpu_percent": usage.cpu_percent,
                    "memory_percent": usage.memory_percent,
                    "disk_percent": usage.disk_percent,
                    "timestamp": Utc::now().to_rfc3339(),
                }))
            }
            "alerts" => {
                let usage = self.system.resource_usage().await?;
                let t = &self.thresholds;
                let mut alerts = Vec::new();
                for (metric, value, limit) in [
                    ("cpu", usage.cpu_percent, t.cpu_percent),
                    ("memory", usage.memory_percent, t.memory_percent),
                    ("disk", usage.disk_percent, t.disk_percent),
                ] {
                    if value > limit {
                        alerts.push(json!({"metric": metric, "value": value, "threshold": limit}));
                    }
                }
                let status = if alerts.is_empty() { "healthy" } else { "alerting" };
                Ok(json!({"alerts": alerts, "status": status}))
            }
            "logs" => Ok(json!({"logs": [], "count": 0})),
            "traces" => Ok(json!({"traces": [], "count": 0})),
            other => anyhow::bail!("monitoring plugin cannot handle '{other}'"),
        }
    }
}

// ── Security ──────────────────────────────────────────────────────────────────

pub struct SecurityPlugin<C> {
    meta: PluginMetadata,
    store: Arc<C>,
}

impl<C> SecurityPlugin<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self {
            meta: metadata(
                "security",
                "Configuration security audit",
                PluginPriority::Critical,
                &["scan", "audit", "harden", "report"],
                json!({"type": "object"}),
            ),
            store,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl<C: ConfigStore + Send + Sync> IntegrationPlugin for SecurityPlugin<C> {
    fn metadata(&self) -> &PluginMetadata {
        &self.meta
    }

    async fn initialize(&self, _config: &Params) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, action: &str, _params: &Params) -> Result<Value> {
        let raw = match self.store.load_raw()? {
            Some(raw) => raw,
            None => serde_json::to_value(self.store.load()?)?,
        };
        let report = audit_config(&raw);
        let risk = if !report.critical.is_empty() {
            "critical"
        } else if !report.high.is_empty() {
            "high"
        } else if !report.medium.is_empty() {
            "medium"
        } else {
            "low"
        };
        match action {
            "scan" | "audit" => Ok(json!({
                "findings": report,
                "risk_level": risk,
                "compliance": if report.critical.is_empty() && report.high.is_empty() { "passed" } else { "failed" },
            })),
            "harden" => Ok(json!({"hardening_applied": false, "changes": []})),
            "report" => Ok(json!({
                "report": format!(
                    "{} issue(s): {} critical, {} high, {} medium, {} low",
                    report.total(),
                    report.critical.len(),
                    report.high.len(),
                    report.medium.len(),
                    report.low.len()
                ),
                "risk_level": risk,
                "config": self.store.path(),
            })),
            other => anyhow::bail!("security plugin cannot handle '{other}'"),
        }
    }
}
