use serde::{Deserialize, Serialize};

/// Plugin execution priority. Lower numeric value runs first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PluginPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl PluginPriority {
    /// Numeric weight: critical 0, high 10, medium 50, low 100.
    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 10,
            Self::Medium => 50,
            Self::Low => 100,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Lifecycle state of a registered plugin
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Active,
    Error,
    Disabled,
}

impl PluginStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Active => "active",
            Self::Error => "error",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
