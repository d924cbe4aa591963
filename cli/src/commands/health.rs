//! `timeshift health`: run the health-check suite.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use timeshift_common::HealthStatus;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::health::{HealthDeps, HealthMonitor, HealthSettings};
use crate::commands::plugins::{load_all, plugin_manager};
use crate::commands::vm::optional_client;
use crate::domain::health::summarize;
use crate::infra::backup::FileBackupStore;
use crate::infra::fs::HostFs;
use crate::infra::network::TokioNetworkProbe;
use crate::infra::system::SysinfoProbe;
use crate::output::progress;

/// Arguments for `timeshift health`.
#[derive(Args)]
pub struct HealthArgs {
    /// Run a single check by name
    #[arg(long, value_name = "NAME")]
    pub check: Option<String>,
    /// Also load the plugins and include their health
    #[arg(long)]
    pub plugins: bool,
}

/// Run the health checks. Exits 1 when the overall status is critical.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or `--check`
/// names an unknown check.
pub async fn run(app: &AppContext, args: &HealthArgs) -> Result<ExitCode> {
    let config = app.config()?;
    let proxmox = optional_client(&config);
    let backups = FileBackupStore::new(config.time.backup_file.clone());
    let probe = TokioNetworkProbe;
    let system = SysinfoProbe;

    let mut settings = HealthSettings::default();
    if let Some(home) = dirs::home_dir() {
        settings.cert_dirs.push(home.join(".ssl"));
    }
    settings.private_files.push(app.config_store.path());

    let deps = HealthDeps {
        runner: &app.runner,
        network: &probe,
        system: &system,
        fs: &HostFs,
        backups: &backups,
        proxmox: proxmox.as_ref(),
    };
    let mut monitor = HealthMonitor::new(deps, settings);

    let mut manager = None;
    if args.plugins {
        let mut m = plugin_manager(app, &config);
        load_all(&mut m).await;
        for check in m.health_checks() {
            monitor.register_check(Box::new(check));
        }
        manager = Some(m);
    }

    let pb = progress::maybe_spinner(app.output.show_progress(), "Running health checks...");
    let results = match &args.check {
        Some(name) => match monitor.run_check(name).await {
            Some(result) => vec![result],
            None => {
                progress::finish_clear(&pb);
                anyhow::bail!(
                    "Unknown check '{name}'. Available: {}",
                    monitor.check_names().join(", ")
                );
            }
        },
        None => monitor.run_all_checks().await,
    };
    progress::finish_clear(&pb);

    if let Some(mut m) = manager {
        m.shutdown().await;
    }

    let summary = summarize(&results);
    app.renderer().render_health(&summary)?;
    Ok(if summary.overall_status == HealthStatus::Critical {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
