//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::application::ports::ConfigStore;
use crate::domain::config::{DEFAULT_CONFIG_PATH, TimeShiftConfig};

/// Environment variable overriding the config location.
pub const CONFIG_ENV: &str = "TIMESHIFT_CONFIG";

/// JSON config file on disk.
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    /// Resolve the location: `--config`, then `TIMESHIFT_CONFIG`, then
    /// `/etc/time-shift-config.json`.
    #[must_use]
    pub fn resolve(cli_override: Option<PathBuf>) -> Self {
        let path = cli_override
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self { path }
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

/// Write `content` via a sibling temp file and rename. `tempfile` creates
/// the file with mode 0600 on unix, which the rename keeps.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("cannot create temp file in {}", dir.display()))?;
    temp.write_all(content.as_bytes())
        .with_context(|| format!("cannot write {}", temp.path().display()))?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("cannot finalize {}", path.display()))?;
    Ok(())
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<TimeShiftConfig> {
        if !self.path.exists() {
            return Ok(TimeShiftConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))
    }

    fn load_raw(&self) -> Result<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))?;
        Ok(Some(value))
    }

    fn save(&self, config: &TimeShiftConfig) -> Result<()> {
        let content = serde_json::to_string_pretty(config).context("cannot serialize config")?;
        write_atomic(&self.path, &content)
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}
