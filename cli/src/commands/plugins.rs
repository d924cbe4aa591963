//! `timeshift plugins`: list, inspect and run integration plugins.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use serde_json::{Value, json};

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::plugins::PluginManager;
use crate::application::services::plugins::builtin::{BuiltinPorts, builtin_plugins};
use crate::commands::vm::optional_client;
use crate::domain::TimeShiftConfig;
use crate::domain::plugin::parse_params;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::JsonConfigStore;
use crate::infra::system::SysinfoProbe;

/// Plugin subcommands.
#[derive(Subcommand)]
pub enum PluginsCommand {
    /// List registered plugins
    List,
    /// Show plugin metadata
    Info { name: String },
    /// Load a plugin (and its dependencies) and run one action
    Run {
        name: String,
        action: String,
        /// Action parameter as key=value (repeatable)
        #[arg(long = "param", short, value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
    /// Load every plugin and report its health
    Health,
}

/// Plugin manager with the built-in plugins discovered (none loaded yet).
pub(crate) fn plugin_manager(app: &AppContext, config: &TimeShiftConfig) -> PluginManager {
    let ports = BuiltinPorts {
        runner: Arc::new(TokioCommandRunner::default()),
        proxmox: optional_client(config).map(Arc::new),
        system: Arc::new(SysinfoProbe),
        config_store: Arc::new(JsonConfigStore::with_path(app.config_store.path())),
        proxmox_host: config.proxmox.host.clone(),
        proxmox_node: config.proxmox.node.clone(),
        vm_defaults: config.vm.clone(),
    };
    let mut manager = PluginManager::new();
    manager.discover_plugins(builtin_plugins(ports));
    manager
}

/// Load every plugin, logging failures. Returns the names that loaded.
pub(crate) async fn load_all(manager: &mut PluginManager) -> Vec<String> {
    let names: Vec<String> = manager.list().into_iter().map(|p| p.metadata.name).collect();
    let mut loaded = Vec::new();
    for name in names {
        match manager.load_plugin(&name, None).await {
            Ok(()) => loaded.push(name),
            Err(e) => tracing::warn!(plugin = %name, error = %e, "plugin not loaded"),
        }
    }
    loaded
}

/// Run a plugins subcommand.
///
/// # Errors
///
/// Returns an error for unknown plugins, malformed parameters, or a failed
/// load or action.
pub async fn run(app: &AppContext, cmd: PluginsCommand) -> Result<ExitCode> {
    let config = app.config()?;
    let mut manager = plugin_manager(app, &config);

    match cmd {
        PluginsCommand::List => app.renderer().render_plugins(&manager.list())?,
        PluginsCommand::Info { name } => app.renderer().render_plugin_info(&manager.info(&name)?)?,
        PluginsCommand::Run {
            name,
            action,
            params,
        } => {
            let params = parse_params(&params)
                .map_err(|bad| anyhow::anyhow!("Invalid parameter '{bad}': expected KEY=VALUE"))?;
            manager.load_plugin(&name, None).await?;
            let result = manager.execute_plugin(&name, &action, &params).await;
            manager.shutdown().await;
            app.renderer().render_value(&result?)?;
        }
        PluginsCommand::Health => {
            load_all(&mut manager).await;
            let results = manager.health_check_all().await;
            manager.shutdown().await;
            let healthy = results
                .iter()
                .all(|(_, v)| v.get("status").and_then(Value::as_str) == Some("healthy"));
            let doc: serde_json::Map<String, Value> = results.into_iter().collect();
            app.renderer().render_value(&json!(doc))?;
            if !healthy {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
