//! Plugin framework: registry, dependency-ordered loading, priority-ordered
//! fan-out and event hooks.

pub mod builtin;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value, json};
use timeshift_common::PluginStatus;
use tracing::{debug, info, warn};

use crate::application::services::health::HealthCheck;
use crate::domain::error::PluginError;
use crate::domain::plugin::{PluginMetadata, load_order, merge_config, missing_required_keys};

pub type Params = Map<String, Value>;

/// An integration with an external system.
///
/// `execute` receives the plugin's merged configuration overlaid with the
/// call parameters.
#[async_trait::async_trait(?Send)]
pub trait IntegrationPlugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Configuration used when the caller supplies none.
    fn default_config(&self) -> Params {
        Params::new()
    }

    /// Check the environment the plugin needs (binaries, API reachability).
    async fn initialize(&self, config: &Params) -> Result<()>;

    async fn execute(&self, action: &str, params: &Params) -> Result<Value>;

    /// # Errors
    ///
    /// Returns `PluginError::InvalidConfig` naming the missing keys.
    fn validate_config(&self, config: &Params) -> Result<(), PluginError> {
        let missing = missing_required_keys(&self.metadata().config_schema, config);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PluginError::InvalidConfig {
                name: self.metadata().name.clone(),
                missing: missing.join(", "),
            })
        }
    }

    async fn health_check(&self) -> Result<Value> {
        Ok(json!({"status": "healthy", "plugin": self.metadata().name}))
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Events this plugin wants to observe once active.
    fn hooks(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called for each subscribed event, in registration order.
    async fn on_event(&self, _event: &str, _payload: &Value) -> Result<()> {
        Ok(())
    }

    fn can_handle(&self, action: &str) -> bool {
        self.metadata().can_handle(action)
    }
}

/// Callback registered with `register_hook`.
pub type HookFn = Box<dyn Fn(&str, &Value) + Send + Sync>;

enum Hook {
    Callback(HookFn),
    Plugin(String),
}

struct Entry {
    plugin: Arc<dyn IntegrationPlugin>,
    status: PluginStatus,
    config: Params,
}

/// Listing row for `plugins list` / `plugins info`.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    #[serde(flatten)]
    pub metadata: PluginMetadata,
    pub status: PluginStatus,
}

#[derive(Default)]
pub struct PluginManager {
    plugins: BTreeMap<String, Entry>,
    hooks: HashMap<String, Vec<Hook>>,
}

impl PluginManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register plugins and return their names. A plugin whose version is
    /// not valid semver is registered as disabled.
    pub fn discover_plugins(&mut self, plugins: Vec<Arc<dyn IntegrationPlugin>>) -> Vec<String> {
        let mut names = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let meta = plugin.metadata();
            let name = meta.name.clone();
            let status = if semver::Version::parse(&meta.version).is_ok() {
                PluginStatus::Unloaded
            } else {
                warn!(plugin = %name, version = %meta.version, "invalid plugin version, disabling");
                PluginStatus::Disabled
            };
            let config = plugin.default_config();
            debug!(plugin = %name, "discovered plugin");
            self.plugins.insert(
                name.clone(),
                Entry {
                    plugin,
                    status,
                    config,
                },
            );
            names.push(name);
        }
        names
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<PluginStatus> {
        self.plugins.get(name).map(|e| e.status)
    }

    #[must_use]
    pub fn list(&self) -> Vec<PluginInfo> {
        let mut rows: Vec<PluginInfo> = self
            .plugins
            .values()
            .map(|e| PluginInfo {
                metadata: e.plugin.metadata().clone(),
                status: e.status,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.metadata
                .priority
                .cmp(&b.metadata.priority)
                .then_with(|| a.metadata.name.cmp(&b.metadata.name))
        });
        rows
    }

    /// # Errors
    ///
    /// Returns `PluginError::NotFound` for unknown names.
    pub fn info(&self, name: &str) -> Result<PluginInfo, PluginError> {
        let entry = self
            .plugins
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        Ok(PluginInfo {
            metadata: entry.plugin.metadata().clone(),
            status: entry.status,
        })
    }

    /// Load `name` and, first, every plugin it depends on.
    ///
    /// `config` is merged over the plugin's current configuration. Loading
    /// an already active plugin only updates its configuration.
    ///
    /// # Errors
    ///
    /// Returns a `PluginError` for unknown plugins, dependency cycles,
    /// missing dependencies, invalid configuration or failed
    /// initialization. The plugin is left in `error` status.
    pub async fn load_plugin(&mut self, name: &str, config: Option<&Params>) -> Result<(), PluginError> {
        let entry = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        if let Some(overrides) = config {
            entry.config = merge_config(&entry.config, overrides);
        }
        if entry.status == PluginStatus::Active {
            return Ok(());
        }
        if entry.status == PluginStatus::Disabled {
            return Err(PluginError::NotActive {
                name: name.to_string(),
                status: entry.status.to_string(),
            });
        }
        entry.status = PluginStatus::Loading;

        let graph: HashMap<String, Vec<String>> = self
            .plugins
            .iter()
            .map(|(n, e)| (n.clone(), e.plugin.metadata().dependencies.clone()))
            .collect();
        let order = match load_order(name, &graph) {
            Ok(order) => order,
            Err(e) => {
                self.set_status(name, PluginStatus::Error);
                return Err(e);
            }
        };

        for step in order {
            if self.status(&step) == Some(PluginStatus::Active) {
                continue;
            }
            if let Err(e) = self.activate(&step).await {
                self.set_status(name, PluginStatus::Error);
                return Err(e);
            }
        }
        Ok(())
    }

    fn set_status(&mut self, name: &str, status: PluginStatus) {
        if let Some(entry) = self.plugins.get_mut(name) {
            entry.status = status;
        }
    }

    async fn activate(&mut self, name: &str) -> Result<(), PluginError> {
        let (plugin, config) = {
            let entry = self
                .plugins
                .get_mut(name)
                .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
            if entry.status == PluginStatus::Disabled {
                return Err(PluginError::NotActive {
                    name: name.to_string(),
                    status: entry.status.to_string(),
                });
            }
            entry.status = PluginStatus::Loading;
            (Arc::clone(&entry.plugin), entry.config.clone())
        };

        if let Err(e) = plugin.validate_config(&config) {
            self.set_status(name, PluginStatus::Error);
            return Err(e);
        }
        self.set_status(name, PluginStatus::Loaded);

        if let Err(e) = plugin.initialize(&config).await {
            warn!(plugin = name, error = %e, "plugin failed to initialize");
            self.set_status(name, PluginStatus::Error);
            return Err(PluginError::InitFailed {
                name: name.to_string(),
                reason: format!("{e:#}"),
            });
        }

        self.set_status(name, PluginStatus::Active);
        for event in plugin.hooks() {
            self.hooks
                .entry(event)
                .or_default()
                .push(Hook::Plugin(name.to_string()));
        }
        info!(plugin = name, "plugin active");
        Ok(())
    }

    /// Subscribe a callback to `event`. Callbacks run in registration order.
    pub fn register_hook(&mut self, event: &str, callback: HookFn) {
        self.hooks
            .entry(event.to_string())
            .or_default()
            .push(Hook::Callback(callback));
    }

    async fn fire_hooks(&self, event: &str, payload: &Value) {
        let Some(hooks) = self.hooks.get(event) else {
            return;
        };
        for hook in hooks {
            match hook {
                Hook::Callback(f) => f(event, payload),
                Hook::Plugin(name) => {
                    let Some(entry) = self.plugins.get(name) else {
                        continue;
                    };
                    if let Err(e) = entry.plugin.on_event(event, payload).await {
                        warn!(plugin = %name, event, error = %e, "hook failed");
                    }
                }
            }
        }
    }

    /// Run `action` on one active plugin, firing `pre_<action>` and
    /// `post_<action>` hooks around it.
    ///
    /// # Errors
    ///
    /// Returns a `PluginError` when the plugin is unknown, inactive or does
    /// not handle `action`, or the plugin's own error.
    pub async fn execute_plugin(&self, name: &str, action: &str, params: &Params) -> Result<Value> {
        let entry = self
            .plugins
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        if entry.status != PluginStatus::Active {
            return Err(PluginError::NotActive {
                name: name.to_string(),
                status: entry.status.to_string(),
            }
            .into());
        }
        if !entry.plugin.can_handle(action) {
            return Err(PluginError::UnsupportedAction {
                name: name.to_string(),
                action: action.to_string(),
            }
            .into());
        }

        let merged = merge_config(&entry.config, params);
        self.fire_hooks(
            &format!("pre_{action}"),
            &json!({"plugin": name, "params": params}),
        )
        .await;
        let result = entry.plugin.execute(action, &merged).await?;
        self.fire_hooks(
            &format!("post_{action}"),
            &json!({"plugin": name, "params": params, "result": result}),
        )
        .await;
        Ok(result)
    }

    /// Run `action` on every active plugin that handles it, in priority
    /// order. Failures are captured per plugin as `{"error": message}`.
    pub async fn execute_action_on_all(&self, action: &str, params: &Params) -> Vec<(String, Value)> {
        let mut targets: Vec<(&String, &Entry)> = self
            .plugins
            .iter()
            .filter(|(_, e)| e.status == PluginStatus::Active && e.plugin.can_handle(action))
            .collect();
        targets.sort_by_key(|(name, e)| (e.plugin.metadata().priority.value(), (*name).clone()));

        let mut results = Vec::with_capacity(targets.len());
        for (name, _) in targets {
            let value = match self.execute_plugin(name, action, params).await {
                Ok(v) => v,
                Err(e) => json!({"error": format!("{e:#}")}),
            };
            results.push((name.clone(), value));
        }
        results
    }

    /// Health of every active plugin. Failures become
    /// `{"status": "error", "error": message}`.
    pub async fn health_check_all(&self) -> Vec<(String, Value)> {
        let mut results = Vec::new();
        for (name, entry) in &self.plugins {
            if entry.status != PluginStatus::Active {
                continue;
            }
            let value = match entry.plugin.health_check().await {
                Ok(v) => v,
                Err(e) => json!({"status": "error", "error": format!("{e:#}")}),
            };
            results.push((name.clone(), value));
        }
        results
    }

    /// One health check per active plugin, for `HealthMonitor::register_check`.
    #[must_use]
    pub fn health_checks(&self) -> Vec<PluginHealthCheck> {
        self.plugins
            .iter()
            .filter(|(_, e)| e.status == PluginStatus::Active)
            .map(|(name, e)| PluginHealthCheck {
                name: format!("plugin:{name}"),
                plugin: Arc::clone(&e.plugin),
            })
            .collect()
    }

    /// Clean up every active plugin and mark it unloaded.
    pub async fn shutdown(&mut self) {
        for (name, entry) in &mut self.plugins {
            if entry.status != PluginStatus::Active {
                continue;
            }
            if let Err(e) = entry.plugin.cleanup().await {
                warn!(plugin = %name, error = %e, "plugin cleanup failed");
            }
            entry.status = PluginStatus::Unloaded;
        }
        self.hooks.retain(|_, hooks| {
            hooks.retain(|h| matches!(h, Hook::Callback(_)));
            !hooks.is_empty()
        });
    }
}

/// Exposes a plugin's `health_check` as a named health check. Only a
/// reported status of `healthy` passes.
pub struct PluginHealthCheck {
    name: String,
    plugin: Arc<dyn IntegrationPlugin>,
}

#[async_trait::async_trait(?Send)]
impl HealthCheck for PluginHealthCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<bool> {
        let report = self.plugin.health_check().await?;
        Ok(report.get("status").and_then(Value::as_str) == Some("healthy"))
    }
}
