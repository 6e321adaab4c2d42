//! # Core Telemetry
//!
//! Structured logging and Prometheus metrics for the core host.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CH_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directive |
//! | `CH_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `CH_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `CH_SERVICE_NAME` | `core-host` | Name on the startup line |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, record_request, register_metrics, HistogramTimer, MetricsHandle,
    CORES_LOADED, CORE_INIT_FAILURES, FETCH_FAILURES, HOSTS_KNOWN, REQUESTS_HANDLED,
    REQUEST_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    Metrics(String),
}

/// Register metrics, then install the log subscriber.
///
/// Hold the guard for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_logging(&config)?;
    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}

/// Start timing a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::HistogramTimer::new(&$histogram)
    };
}
