//! Application service: Proxmox VM operations.

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::application::ports::ProxmoxApi;
use crate::domain::proxmox::{VmStatus, snapshot_description};
use crate::domain::validate::{validate_command, validate_vm_name};

/// Fetch the status of several VMs concurrently. A VM whose lookup fails
/// maps to `None`; the output keeps the input order.
pub async fn batch_vm_status(api: &impl ProxmoxApi, vmids: &[u32]) -> Vec<(u32, Option<VmStatus>)> {
    let lookups = vmids.iter().map(|&vmid| async move {
        match api.vm_status(vmid).await {
            Ok(status) => (vmid, Some(status)),
            Err(e) => {
                warn!(vmid, error = %e, "VM status lookup failed");
                (vmid, None)
            }
        }
    });
    join_all(lookups).await
}

/// Snapshot a VM with a timestamped description.
///
/// # Errors
///
/// Returns an error if the name is not a valid identifier or the API call
/// fails.
pub async fn create_vm_snapshot(api: &impl ProxmoxApi, vmid: u32, name: &str) -> Result<String> {
    let name = validate_vm_name(name)?;
    let upid = api
        .create_snapshot(vmid, &name, &snapshot_description(Utc::now()))
        .await?;
    info!(vmid, snapshot = %name, "snapshot created");
    Ok(upid)
}

/// Run a command through the guest agent. Shell operators are refused.
///
/// # Errors
///
/// Returns an error if the command is rejected or the API call fails.
pub async fn execute_vm_command(
    api: &impl ProxmoxApi,
    vmid: u32,
    command: &str,
) -> Result<serde_json::Value> {
    let command = validate_command(command, false)?;
    let reply = api.exec_command(vmid, &command).await?;
    info!(vmid, %command, "guest command submitted");
    Ok(reply)
}
