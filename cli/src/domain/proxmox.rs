//! Proxmox VE wire types and request helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::config::ProxmoxConfig;
use crate::domain::error::ProxmoxError;

/// One row of `GET /nodes/{node}/qemu`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmSummary {
    pub vmid: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cpus: Option<f64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
}

/// `GET /nodes/{node}/qemu/{vmid}/status/current`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmStatus {
    #[serde(default)]
    pub vmid: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub qmpstatus: Option<String>,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub mem: Option<u64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
}

impl VmStatus {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// `https://{host}:{port}/api2/json`.
#[must_use]
pub fn base_url(config: &ProxmoxConfig) -> String {
    let host = if config.host.contains(':') && !config.host.starts_with('[') {
        format!("[{}]", config.host)
    } else {
        config.host.clone()
    };
    format!("https://{host}:{}/api2/json", config.port)
}

/// `Authorization` header value for API-token auth:
/// `PVEAPIToken=USER@REALM!TOKENID=SECRET`.
///
/// # Errors
///
/// Returns `ProxmoxError::MissingToken` when the token is not configured.
pub fn api_token_header(config: &ProxmoxConfig) -> Result<String, ProxmoxError> {
    if !config.has_token() {
        return Err(ProxmoxError::MissingToken);
    }
    Ok(format!(
        "PVEAPIToken={}!{}={}",
        config.username, config.token_id, config.token_secret
    ))
}

#[must_use]
pub fn qemu_path(node: &str, vmid: u32, rest: &str) -> String {
    if rest.is_empty() {
        format!("/nodes/{node}/qemu/{vmid}")
    } else {
        format!("/nodes/{node}/qemu/{vmid}/{rest}")
    }
}

/// Description attached to snapshots taken by this tool.
#[must_use]
pub fn snapshot_description(now: DateTime<Utc>) -> String {
    format!("Time-shift snapshot created at {}", now.format("%Y-%m-%d %H:%M:%S"))
}
