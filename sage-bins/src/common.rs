//! Shared initialization for the binaries

use anyhow::Result;
use clap::Parser;
use sage_core::config::Config;
use std::path::PathBuf;

/// Common CLI arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level override (otherwise from config; RUST_LOG wins over both)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,
}

/// Load configuration and bring up logging
///
/// CLI flags override the config file's `[logging]` section.
pub fn init(args: &CommonArgs) -> Result<Config> {
    let config = Config::load(&args.config)?;

    let mut logging = config.logging.clone();
    if let Some(level) = &args.log_level {
        logging.log_level = level.clone();
    }
    logging.json_logs |= args.json_logs;
    sage_core::utils::init_logging(&logging)?;

    Ok(config)
}
