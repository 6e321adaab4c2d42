//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Filter directive (`info`, `ch_03_core_store=debug,info`, ...)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Write logs to stdout at all
    pub console_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "core-host".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            console_output: true,
        }
    }
}

fn flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CH_SERVICE_NAME`: Service name (default: core-host)
    /// - `CH_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `CH_JSON_LOGS`: JSON output (default: true inside containers)
    /// - `CH_CONSOLE_OUTPUT`: Set to `false` or `0` to silence stdout
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let defaults = Self::default();

        Self {
            service_name: env::var("CH_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: env::var("CH_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: env::var("CH_JSON_LOGS")
                .map(|v| flag(&v))
                .unwrap_or(is_container),
            console_output: env::var("CH_CONSOLE_OUTPUT")
                .map(|v| !v.eq_ignore_ascii_case("false") && v != "0")
                .unwrap_or(defaults.console_output),
        }
    }
}
