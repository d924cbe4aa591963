//! `tracing` subscriber setup.
//!
//! Console logs go to stderr so stdout stays clean for `--json`. The
//! console filter is `timeshift_cli=warn` (`debug` with `--verbose`) and
//! `RUST_LOG` overrides it. When `logging.file` points into an existing
//! directory, JSON lines at `logging.level` are appended there too.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _, fmt};

use crate::domain::config::LoggingConfig;

const CRATE_TARGET: &str = "timeshift_cli";

fn console_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "warn" };
        EnvFilter::new(format!("{CRATE_TARGET}={level}"))
    })
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    let console = logging.console_output || verbose;
    let (json_layer, text_layer) = match (console, logging.structured) {
        (false, _) => (None, None),
        (true, true) => (
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(console_filter(verbose)),
            ),
            None,
        ),
        (true, false) => (
            None,
            Some(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_filter(console_filter(verbose)),
            ),
        ),
    };

    let mut file_error = None;
    let file_layer = logging
        .file
        .as_deref()
        .filter(|p| p.parent().is_some_and(Path::is_dir))
        .and_then(|path| match open_log_file(path) {
            Ok(file) => Some(file),
            Err(e) => {
                file_error = Some(format!("{}: {e}", path.display()));
                None
            }
        })
        .map(|file| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(EnvFilter::new(format!(
                    "{CRATE_TARGET}={}",
                    logging.level.as_filter()
                )))
        });

    let _ = tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init();

    if let Some(e) = file_error {
        debug!(error = %e, "file logging disabled");
    }
}
