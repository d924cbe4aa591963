//! Infrastructure implementation of the `TimeBackupStore` port.
//!
//! The backup is written atomically on a blocking thread so a crash during
//! a shift never leaves a half-written file behind.

use std::path::PathBuf;

use anyhow::{Context, Result};
use timeshift_common::TimeBackup;

use crate::application::ports::TimeBackupStore;
use crate::infra::config::write_atomic;

pub struct FileBackupStore {
    path: PathBuf,
}

impl FileBackupStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_sync(path: &PathBuf) -> Result<Option<TimeBackup>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading backup file {}", path.display()))?;
        let backup = serde_json::from_str(&content)
            .with_context(|| format!("parsing backup file {}", path.display()))?;
        Ok(Some(backup))
    }
}

impl TimeBackupStore for FileBackupStore {
    async fn load(&self) -> Result<Option<TimeBackup>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .context("backup load task panicked")?
    }

    async fn save(&self, backup: &TimeBackup) -> Result<()> {
        let path = self.path.clone();
        let content = serde_json::to_string_pretty(backup).context("serializing backup")?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .context("backup save task panicked")?
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing backup file {}", self.path.display())),
        }
    }
}
