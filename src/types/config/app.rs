use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::types::config::chain::ChainConfig;

pub const DEFAULT_EVENT_WINDOW_BLOCKS: u64 = 5000;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const DEFAULT_WINDOW_CONCURRENCY: usize = 4;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

fn default_abi_path() -> PathBuf {
    PathBuf::from("abis/OpsGovernor.json")
}

fn default_event_window_blocks() -> u64 {
    DEFAULT_EVENT_WINDOW_BLOCKS
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_window_concurrency() -> usize {
    DEFAULT_WINDOW_CONCURRENCY
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub chains: Vec<ChainConfig>,
    #[serde(default = "default_abi_path")]
    pub abi_path: PathBuf,
    /// Widest block range one log query may cover.
    #[serde(default = "default_event_window_blocks")]
    pub event_window_blocks: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_window_concurrency")]
    pub window_concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let mut config = Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        // Relative ABI paths resolve against the project root, one level
        // above the config directory.
        if config.abi_path.is_relative() {
            let root = base_dir.parent().unwrap_or(Path::new("."));
            config.abi_path = root.join(&config.abi_path);
        }

        Ok(config)
    }

    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_json::from_str(content)?;
        anyhow::ensure!(!config.chains.is_empty(), "Config lists no chains");
        anyhow::ensure!(
            config.event_window_blocks > 0,
            "event_window_blocks must be positive"
        );
        anyhow::ensure!(config.page_size > 0, "page_size must be positive");
        anyhow::ensure!(
            config.window_concurrency > 0,
            "window_concurrency must be positive"
        );
        anyhow::ensure!(config.poll_interval_ms > 0, "poll_interval_ms must be positive");
        Ok(config)
    }

    /// Chain by name, or the first configured chain.
    pub fn chain(&self, name: Option<&str>) -> anyhow::Result<&ChainConfig> {
        match name {
            Some(name) => self
                .chains
                .iter()
                .find(|c| c.name == name)
                .with_context(|| format!("No chain named {} in config", name)),
            None => self.chains.first().context("Config lists no chains"),
        }
    }
}
