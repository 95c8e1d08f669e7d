//! Telemetry configuration from environment variables.

use std::env;

/// Default service name in log records.
pub const DEFAULT_SERVICE_NAME: &str = "rpc-messenger";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log record
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error, or directives)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to colorize human-readable output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MESSENGER_SERVICE_NAME`: Service name (default: rpc-messenger)
    /// - `MESSENGER_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `MESSENGER_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container = lookup("KUBERNETES_SERVICE_HOST").is_some()
            || lookup("DOCKER_CONTAINER").is_some();
        let json_logs = lookup("MESSENGER_JSON_LOGS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(is_container);

        Self {
            service_name: lookup("MESSENGER_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),

            log_level: lookup("MESSENGER_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            json_logs,
            ansi: !json_logs,
        }
    }

    /// Configuration for a named service.
    pub fn for_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Self::from_env()
        }
    }
}
