//! `timeshift validate` and `timeshift network ...`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::app::AppContext;
use crate::application::services::network::{NetworkValidator, generate_connectivity_report};
use crate::domain::network::{ConnectivityTarget, DEFAULT_PING_COUNT, TargetKind};
use crate::domain::validate::{validate_host, validate_ip_address};
use crate::infra::fs::HostFs;
use crate::infra::network::TokioNetworkProbe;
use crate::output::progress;

/// Arguments for `timeshift validate`.
#[derive(Args)]
pub struct ValidateArgs {
    /// iDRAC IP address to check
    #[arg(long, value_name = "IP")]
    pub idrac_ip: String,
}

/// `timeshift network` subcommands.
#[derive(Subcommand)]
pub enum NetworkCommand {
    /// Ping, port and certificate check for one host
    Check {
        /// Host name or address
        host: String,
        /// Port to probe
        #[arg(long, default_value_t = 443)]
        port: u16,
        /// Also run the iDRAC web-interface check
        #[arg(long)]
        idrac: bool,
    },
    /// Probe several targets and print or save a report
    Report {
        /// Targets as `host` or `host:port` (repeatable)
        #[arg(long = "target", required = true, value_name = "HOST[:PORT]")]
        targets: Vec<String>,
        /// Targets to check as iDRAC interfaces (repeatable)
        #[arg(long = "idrac", value_name = "HOST")]
        idracs: Vec<String>,
        /// Write the report to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Ping a host
    Ping {
        /// Host name or address
        host: String,
        /// Echo requests to send
        #[arg(long, short, default_value_t = DEFAULT_PING_COUNT)]
        count: u32,
    },
    /// Resolve a host name
    Dns {
        /// Host name to resolve
        host: String,
    },
}

/// Run `timeshift validate --idrac-ip`.
///
/// Exits 1 when the interface is not accessible.
///
/// # Errors
///
/// Returns an error if the address is not a valid IP or the configuration
/// cannot be loaded.
pub async fn validate(app: &AppContext, args: &ValidateArgs) -> Result<ExitCode> {
    let ip = validate_ip_address(&args.idrac_ip)?;
    let config = app.config()?;
    let validator = NetworkValidator::new(&app.runner, &TokioNetworkProbe)
        .with_timeout(Duration::from_secs(config.idrac.timeout));

    let pb = progress::maybe_spinner(app.output.show_progress(), &format!("Checking iDRAC {ip}..."));
    let check = validator.validate_idrac_connection(&ip.to_string()).await;
    progress::finish_clear(&pb);

    app.renderer().render_idrac(&check)?;
    Ok(if check.accessible {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run a `timeshift network` subcommand.
///
/// # Errors
///
/// Returns an error for unparseable targets or when the report file cannot
/// be written.
pub async fn run(app: &AppContext, cmd: NetworkCommand) -> Result<ExitCode> {
    let probe = TokioNetworkProbe;
    let validator = NetworkValidator::new(&app.runner, &probe);

    match cmd {
        NetworkCommand::Check { host, port, idrac } => {
            let kind = if idrac { TargetKind::Idrac } else { TargetKind::Generic };
            let target = ConnectivityTarget {
                host,
                port,
                kind,
            };
            let pb = progress::maybe_spinner(
                app.output.show_progress(),
                &format!("Probing {}:{}...", target.host, target.port),
            );
            let results = validator.test_connectivity_suite(&[target]).await;
            progress::finish_clear(&pb);
            app.renderer().render_connectivity(&results)?;
            let reachable = results.iter().all(|r| r.ping || r.port_open);
            Ok(if reachable {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        NetworkCommand::Report {
            targets,
            idracs,
            output,
        } => {
            let mut parsed = Vec::new();
            for (spec, kind) in targets
                .iter()
                .map(|t| (t, TargetKind::Generic))
                .chain(idracs.iter().map(|t| (t, TargetKind::Idrac)))
            {
                let target = ConnectivityTarget::parse(spec, kind)
                    .ok_or_else(|| anyhow::anyhow!("Invalid target '{spec}': expected HOST or HOST:PORT"))?;
                parsed.push(target);
            }

            let pb = progress::maybe_spinner(
                app.output.show_progress(),
                &format!("Probing {} target(s)...", parsed.len()),
            );
            let results = validator.test_connectivity_suite(&parsed).await;
            progress::finish_clear(&pb);

            let report = generate_connectivity_report(&HostFs, &results, output.as_deref())?;
            if app.is_json() {
                app.renderer().render_connectivity(&results)?;
            } else if let Some(path) = &output {
                app.output
                    .success(&format!("Report written to {}", path.display()));
            } else {
                println!("{report}");
            }
            Ok(ExitCode::SUCCESS)
        }
        NetworkCommand::Ping { host, count } => {
            let host = validate_host(&host)?;
            let ok = validator.ping_host(&host, count).await;
            if app.is_json() {
                app.renderer()
                    .render_value(&json!({ "host": host, "reachable": ok }))?;
            } else if ok {
                app.output.success(&format!("{host} is reachable"));
            } else {
                app.output.error(&format!("{host} did not answer ping"));
            }
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        NetworkCommand::Dns { host } => {
            let Some(ip) = validator.dns_lookup(&host).await else {
                app.output.error(&format!("Could not resolve {host}"));
                return Ok(ExitCode::FAILURE);
            };
            if app.is_json() {
                app.renderer()
                    .render_value(&json!({ "host": host, "address": ip.to_string() }))?;
            } else {
                app.output.kv(&format!("{host}:"), &ip.to_string());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
