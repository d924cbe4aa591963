//! JSON-lines security audit log.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::AuditSink;
use crate::domain::audit::AuditEvent;

/// Appends one JSON object per line to `path`.
pub struct JsonLinesAuditLog {
    path: PathBuf,
}

impl JsonLinesAuditLog {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl AuditSink for JsonLinesAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(event).context("serializing audit event")?;
        line.push('\n');
        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", self.path.display()))
    }
}
