//! # Core Host
//!
//! Loads the host configuration, brings up every container, serves HTTP
//! until Ctrl+C and then runs the ordered shutdown.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CH_CONFIG` | `core-host.toml` | Host configuration file |
//! | `CH_HTTP_PORT` | `host.http_port`, else `8983` | Listen port and advertised port |
//!
//! Logging is configured through the `CH_LOG_LEVEL` family read by
//! `core-telemetry`.

use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use core_runtime::{http, ContainersOptions, CoreContainers};
use core_telemetry::{init_telemetry, TelemetryConfig};
use shared_types::{ConfigNode, ConfigSource, FileConfigSource, InlineConfigSource};
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "core-host.toml";

/// Configuration tree plus the overrides taken from the environment.
///
/// An explicit `CH_CONFIG` must exist. Without it a missing default file
/// means an empty configuration.
fn load_config() -> Result<(ConfigNode, ContainersOptions)> {
    let source: Box<dyn ConfigSource> = match env::var("CH_CONFIG") {
        Ok(path) => Box::new(FileConfigSource::new(path)),
        Err(_) if Path::new(DEFAULT_CONFIG).exists() => Box::new(FileConfigSource::new(DEFAULT_CONFIG)),
        Err(_) => {
            warn!(path = DEFAULT_CONFIG, "[runtime] No configuration file, using defaults");
            Box::new(InlineConfigSource::new("defaults", ""))
        }
    };
    let root = source
        .load()
        .with_context(|| format!("loading configuration from {}", source.resource_name()))?;

    let http_port = match env::var("CH_HTTP_PORT") {
        Ok(value) => Some(
            value
                .parse::<u16>()
                .with_context(|| format!("invalid CH_HTTP_PORT '{value}'"))?,
        ),
        Err(_) => None,
    };
    Ok((
        root,
        ContainersOptions {
            http_port,
            fetcher: None,
        },
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    let (root, options) = load_config()?;
    let containers = CoreContainers::with_options(root, options)?;
    let loaded = containers.init()?;
    containers.on_inited().await?;

    let port = containers.cluster().config().identity.http_port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(loaded, addr = %addr, "[runtime] Core host is running. Press Ctrl+C to stop.");

    let served = http::serve(Arc::clone(&containers), addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "[runtime] Failed to listen for Ctrl+C");
        }
    })
    .await;

    containers.shutdown().await;
    served?;
    Ok(())
}
