//! Timeshift CLI - work with expired iDRAC certificates by shifting the clock

use std::process::ExitCode;

use clap::Parser;

use timeshift_cli::cli::Cli;
use timeshift_cli::output::json::{error_code, format_error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            match format_error(&message, error_code(&e)) {
                Ok(doc) if json => println!("{doc}"),
                _ => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}
