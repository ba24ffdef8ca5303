//! Logging system setup
//!
//! Installs the global `tracing` subscriber used by the host and every mod it
//! runs. Mods only ever emit through the `tracing` macros.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system
///
/// The filter honours `RUST_LOG` when it is set and otherwise falls back to
/// `level`. With `json_format` the output is one JSON object per line, for
/// log aggregation. Logs go to stderr; stdout is left to the host.
///
/// # Errors
/// * Returns an error if a global subscriber is already installed
pub fn setup_logging(level: &str, json_format: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
