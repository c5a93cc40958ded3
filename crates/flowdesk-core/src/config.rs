//! Application configuration management.
//!
//! This module handles loading and saving the client configuration:
//! API base URL, request timeout and the last username used to log in.
//!
//! Configuration is stored at `~/.config/flowdesk/config.json`. The
//! `FLOWDESK_API_URL` and `FLOWDESK_TIMEOUT_MS` environment variables
//! override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/data directory paths
const APP_NAME: &str = "flowdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API location (the backend's development address)
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Requests not finished within this window fail with a timeout.
const DEFAULT_TIMEOUT_MS: u64 = 5000;

const ENV_API_URL: &str = "FLOWDESK_API_URL";
const ENV_TIMEOUT_MS: &str = "FLOWDESK_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub timeout_ms: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            last_username: None,
        }
    }
}

/// Settings fixed when an `ApiClient` is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Config::default().client_config()
    }
}

impl Config {
    /// Load from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Self =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config.validated())
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.timeout_ms = ms,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_MS),
            }
        }
    }

    /// A zero timeout would fail every request, so fall back to the default
    fn validated(mut self) -> Self {
        if self.timeout_ms == 0 {
            warn!("Ignoring timeout_ms = 0 in config file");
            self.timeout_ms = DEFAULT_TIMEOUT_MS;
        }
        self
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(
            self.api_base_url.clone(),
            Duration::from_millis(self.timeout_ms),
        )
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the persisted session lives
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
