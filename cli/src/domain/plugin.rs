//! Plugin metadata, config-schema checks and dependency ordering.
//!
//! The runtime registry lives in `application::services::plugins`.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use timeshift_common::PluginPriority;

use crate::domain::error::PluginError;

/// Static description of a plugin.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PluginMetadata {
    pub name: String,
    /// Semantic version of the plugin.
    pub version: String,
    pub author: String,
    pub description: String,
    pub priority: PluginPriority,
    pub dependencies: Vec<String>,
    pub capabilities: Vec<String>,
    /// JSON-schema-like object; only `required` is enforced.
    pub config_schema: Value,
}

impl PluginMetadata {
    #[must_use]
    pub fn can_handle(&self, action: &str) -> bool {
        self.capabilities.iter().any(|c| c == action)
    }
}

/// Keys listed under `config_schema.required` that are absent from `config`.
#[must_use]
pub fn missing_required_keys(schema: &Value, config: &Map<String, Value>) -> Vec<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|required| {
            required
                .iter()
                .filter_map(Value::as_str)
                .filter(|key| config.get(*key).is_none_or(Value::is_null))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Shallow merge: keys in `overrides` replace keys in `base`.
#[must_use]
pub fn merge_config(base: &Map<String, Value>, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (k, v) in overrides {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Order `root` and its transitive dependencies so every plugin comes after
/// the plugins it depends on. `root` is always last.
///
/// # Errors
///
/// Returns `PluginError::DependencyCycle` with the offending path, or
/// `PluginError::MissingDependency` when a dependency is not registered.
pub fn load_order(root: &str, deps: &HashMap<String, Vec<String>>) -> Result<Vec<String>, PluginError> {
    fn visit(
        name: &str,
        deps: &HashMap<String, Vec<String>>,
        done: &mut HashSet<String>,
        stack: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<(), PluginError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(PluginError::DependencyCycle(cycle));
        }
        let Some(children) = deps.get(name) else {
            return Err(PluginError::NotFound(name.to_string()));
        };
        stack.push(name.to_string());
        for child in children {
            if !deps.contains_key(child) {
                return Err(PluginError::MissingDependency {
                    plugin: name.to_string(),
                    dependency: child.clone(),
                });
            }
            visit(child, deps, done, stack, order)?;
        }
        stack.pop();
        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    let mut order = Vec::new();
    visit(root, deps, &mut HashSet::new(), &mut Vec::new(), &mut order)?;
    Ok(order)
}

/// Parse `key=value` CLI parameters into a JSON object. Values that parse as
/// JSON (numbers, booleans, arrays) keep their type; everything else is a
/// string.
///
/// # Errors
///
/// Returns the offending entry when it has no `=`.
pub fn parse_params(pairs: &[String]) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for pair in pairs {
        let Some((k, v)) = pair.split_once('=') else {
            return Err(pair.clone());
        };
        let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.to_string()));
        map.insert(k.trim().to_string(), value);
    }
    Ok(map)
}
