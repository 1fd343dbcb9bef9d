//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from `appsettings*.toml`
//! files and fall back to defaults for missing fields.

use serde::{Deserialize, Serialize};

/// Environment used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "Production";

/// Application name used when none is configured.
pub const DEFAULT_APPLICATION_NAME: &str = "ConsoleHost";

/// Root configuration for the host.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Host identity (environment, application name).
    pub host: HostSection,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Host identity.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HostSection {
    /// Environment name, interpolated into startup method names (e.g. "Development").
    pub environment: String,

    pub application_name: String,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub json: bool,

    /// Record startup counters through the metrics facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_enabled: true,
        }
    }
}
