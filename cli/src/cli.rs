//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::infra::logging::init_tracing;

/// Shift the system clock to work with expired iDRAC certificates
#[derive(Parser)]
#[command(
    name = "timeshift",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to every prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Configuration file (default: $TIMESHIFT_CONFIG or /etc/time-shift-config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Move the clock back and disable NTP
    Shift(commands::time::ShiftArgs),

    /// Restore the clock and NTP saved by `shift`
    Restore,

    /// Clock status and certificate date helper
    #[command(subcommand)]
    Time(commands::time::TimeCommand),

    /// Check that an iDRAC answers on the network
    Validate(commands::network::ValidateArgs),

    /// Connectivity checks
    #[command(subcommand)]
    Network(commands::network::NetworkCommand),

    /// Manage Proxmox virtual machines
    #[command(subcommand)]
    Vm(commands::vm::VmCommand),

    /// Run health checks
    Health(commands::health::HealthArgs),

    /// Manage integration plugins
    #[command(subcommand)]
    Plugins(commands::plugins::PluginsCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Render configuration templates
    #[command(subcommand)]
    Template(commands::template::TemplateCommand),

    /// Interactive configuration
    Wizard,

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            verbose,
            yes,
            config,
            command,
        } = self;

        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes, config },
        });

        // A broken config file is reported by the command itself.
        let logging = app.config().map(|c| c.logging).unwrap_or_default();
        init_tracing(verbose, &logging);

        match command {
            Command::Shift(args) => commands::time::shift(&app, &args).await,
            Command::Restore => commands::time::restore(&app).await,
            Command::Time(cmd) => commands::time::run(&app, cmd).await,
            Command::Validate(args) => commands::network::validate(&app, &args).await,
            Command::Network(cmd) => commands::network::run(&app, cmd).await,
            Command::Vm(cmd) => commands::vm::run(&app, cmd).await,
            Command::Health(args) => commands::health::run(&app, &args).await,
            Command::Plugins(cmd) => commands::plugins::run(&app, cmd).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Template(cmd) => commands::template::run(&app, cmd),
            Command::Wizard => commands::wizard::run(&app),
            Command::Version => commands::version::run(&app),
        }
    }
}
