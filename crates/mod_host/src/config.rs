//! Host configuration: one TOML file with a section per mod.

use crate::args::Args;
use anyhow::{Context, Result};
use plugin_backpack::BackpackConfig;
use plugin_trivia::TriviaConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Root for every file the mods keep.
    pub data_dir: PathBuf,
    pub logging: LoggingSettings,
    pub trivia: TriviaConfig,
    pub backpack: BackpackConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            logging: LoggingSettings::default(),
            trivia: TriviaConfig::default(),
            backpack: BackpackConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn questions_path(&self) -> PathBuf {
        self.data_dir.join("questions.json")
    }

    pub fn trivia_state_path(&self) -> PathBuf {
        self.data_dir.join("trivia_state.json")
    }

    pub fn backpack_dir(&self) -> PathBuf {
        self.data_dir.join("backpacks")
    }

    /// Starter kit path, relative paths resolved against the data directory.
    pub fn starter_kit_path(&self) -> PathBuf {
        let path = &self.backpack.starter_kit_path;
        if path.is_absolute() {
            path.clone()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(dir) = &args.data_dir {
            self.data_dir = dir.clone();
        }
        if args.debug {
            self.logging.level = "debug".to_string();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(format!("Unknown log level '{}'", self.logging.level));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }
        self.trivia.validate()?;
        self.backpack.validate()?;
        Ok(())
    }
}

/// Reads the configuration, writing a default file first if none exists.
pub async fn load_config(path: &Path) -> Result<HostConfig> {
    if path.exists() {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match toml::from_str::<HostConfig>(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Failed to parse config file {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    } else {
        warn!("Configuration file not found: {}, using defaults", path.display());
        let config = HostConfig::default();
        let contents = toml::to_string_pretty(&config)?;
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Created default configuration file: {}", path.display());
        Ok(config)
    }
}
