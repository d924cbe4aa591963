use serde::{Deserialize, Serialize};

/// Snapshot of the host clock taken before a time shift.
///
/// Persisted as JSON so a later `restore` (possibly from another process)
/// can put the clock back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBackup {
    /// Local wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub timezone: String,
    /// Missing in old backups; those are treated as NTP-managed.
    #[serde(default = "default_ntp_enabled")]
    pub ntp_enabled: bool,
    /// RFC 3339 time at which the backup was written.
    pub backup_created: String,
}

fn default_ntp_enabled() -> bool {
    true
}
