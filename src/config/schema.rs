//! Configuration schema definitions.
//!
//! This module defines the user configuration handed to the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root user configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct UserConfig {
    /// Active profile (exposed to clients via `config.profile`).
    pub profile: ProfileConfig,

    /// Listener settings for the daemon transports.
    pub daemon: DaemonConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Usage reporting settings.
    pub telemetry: TelemetryConfig,
}

/// Profile the daemon acts on behalf of.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProfileConfig {
    /// Profile name (e.g., "default").
    pub name: String,

    /// Optional project the profile belongs to.
    pub project_name: Option<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            project_name: None,
        }
    }
}

/// Daemon listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Host both transports bind to.
    pub host: String,

    /// Maximum concurrent connections on the native transport (backpressure).
    pub max_connections: usize,

    /// Maximum request size in bytes, per frame or per HTTP body.
    pub max_request_bytes: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            max_connections: 256,
            max_request_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Report method invocations to the telemetry client.
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
