//! `timeshift vm`: Proxmox VM operations.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use tracing::warn;

use crate::app::{AppContext, current_user};
use crate::application::ports::ProxmoxApi;
use crate::application::services::{config_service, proxmox};
use crate::domain::TimeShiftConfig;
use crate::domain::audit::AuditEvent;
use crate::infra::proxmox::ProxmoxClient;

/// VM subcommands.
#[derive(Subcommand)]
pub enum VmCommand {
    /// List VMs on the configured node
    List,
    /// Show status of one or more VMs
    Status {
        /// VM ids
        #[arg(required = true)]
        vmids: Vec<u32>,
    },
    /// Start a VM
    Start { vmid: u32 },
    /// Stop a VM
    Stop { vmid: u32 },
    /// Create a snapshot
    Snapshot {
        vmid: u32,
        /// Snapshot name (letters, digits and `-`)
        name: String,
    },
    /// Run a command through the QEMU guest agent
    Exec {
        vmid: u32,
        /// Command line; shell operators are rejected
        command: String,
    },
}

/// Client for the configured node, `None` when no API token is set.
pub(crate) fn optional_client(config: &TimeShiftConfig) -> Option<ProxmoxClient> {
    if !config.proxmox.has_token() {
        return None;
    }
    match ProxmoxClient::new(&config.proxmox) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "could not build Proxmox client");
            None
        }
    }
}

/// Run a VM subcommand.
///
/// # Errors
///
/// Returns an error if no API token is configured, the arguments are
/// rejected, or the Proxmox API call fails.
pub async fn run(app: &AppContext, cmd: VmCommand) -> Result<ExitCode> {
    let config = app.config()?;
    let api = ProxmoxClient::new(&config.proxmox)?;
    let audit = app.audit_log(&config);
    let record = |action: &str, vmid: u32| {
        let event = AuditEvent::new("vm", &current_user(), action, &format!("vm/{vmid}"), "success");
        config_service::record_audit(&audit, &config, &event);
    };

    match cmd {
        VmCommand::List => {
            let vms = api.list_vms().await?;
            app.renderer().render_vm_list(&vms)?;
        }
        VmCommand::Status { vmids } => {
            let statuses = proxmox::batch_vm_status(&api, &vmids).await;
            app.renderer().render_vm_statuses(&statuses)?;
            if statuses.iter().any(|(_, s)| s.is_none()) {
                return Ok(ExitCode::FAILURE);
            }
        }
        VmCommand::Start { vmid } => {
            let task = api.start_vm(vmid).await?;
            record("start", vmid);
            report_task(app, vmid, "start", &task)?;
        }
        VmCommand::Stop { vmid } => {
            if !app.confirm(&format!("Stop VM {vmid}?"), true)? {
                app.output.info("Cancelled");
                return Ok(ExitCode::SUCCESS);
            }
            let task = api.stop_vm(vmid).await?;
            record("stop", vmid);
            report_task(app, vmid, "stop", &task)?;
        }
        VmCommand::Snapshot { vmid, name } => {
            let task = proxmox::create_vm_snapshot(&api, vmid, &name).await?;
            record("snapshot", vmid);
            report_task(app, vmid, "snapshot", &task)?;
        }
        VmCommand::Exec { vmid, command } => {
            let reply = proxmox::execute_vm_command(&api, vmid, &command).await?;
            record("exec", vmid);
            app.renderer().render_value(&reply)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report_task(app: &AppContext, vmid: u32, action: &str, task: &str) -> Result<()> {
    if app.is_json() {
        app.renderer()
            .render_value(&json!({ "vmid": vmid, "action": action, "task": task }))
    } else {
        app.output
            .success(&format!("VM {vmid}: {action} submitted ({task})"));
        Ok(())
    }
}
