//! Command-line arguments for the host.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path. A default file is written if it is missing.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the data directory (questions, round result, backpacks)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            data_dir: None,
            debug: false,
            json_logs: false,
        }
    }
}
