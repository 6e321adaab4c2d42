//! `tracing-subscriber` setup.
//!
//! JSON output carries target, thread id, file and line; the plain format
//! keeps only the target.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Logging(format!("bad filter '{}': {e}", config.log_level)))?;

    let output = if !config.console_output {
        None
    } else if config.json_logs {
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        )
    } else {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(true)
                .boxed(),
        )
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(output)
        .try_init()
        .map_err(|e| TelemetryError::Logging(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        filter = %config.log_level,
        "Logging initialized"
    );
    Ok(())
}
