pub mod health;
pub mod plugin;
pub mod time;

pub use health::{HealthCheckResult, HealthStatus, HealthSummary, StatusCounts};
pub use plugin::{PluginPriority, PluginStatus};
pub use time::TimeBackup;
