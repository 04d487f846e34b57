//! Configuration management for the CLI

use anyhow::{Context, Result};
use karpx_lib::OptimizationMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "KARPX_CONFIG";

/// CLI configuration, stored at `~/.config/karpx/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Context used when `--context` is not given
    pub default_context: Option<String>,
    /// Optimization mode used by `nodes` when `--mode` is not given
    pub default_mode: Option<OptimizationMode>,
    /// Maximum clusters inspected at once by `status`
    pub max_in_flight: Option<usize>,
}

impl Config {
    /// Load configuration from the default location, or defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("karpx").join("config.json"))
    }
}
