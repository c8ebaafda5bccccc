//! Logging bring-up from the `[logging]` configuration section
//!
//! The 1 Hz status lines are emitted under the stage targets
//! (`sage::ade`, `sage::rme`, `sage::poe`), so the text format keeps
//! targets on and stays grep-able per component; JSON output is for log
//! shippers. `RUST_LOG` wins over the configured level, which lets an
//! operator turn one stage up without touching the config file.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber
///
/// Errors if a subscriber is already installed - call once, from the
/// binary entry point.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level {:?}", config.log_level))?;

    if config.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true))
            .try_init()
            .context("logging already initialized")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().compact().with_target(true))
            .try_init()
            .context("logging already initialized")?;
    }

    Ok(())
}
