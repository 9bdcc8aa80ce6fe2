//! Application configuration management.
//!
//! Holds the gateway location, the folder the media library mirrors, and the
//! sync cadence. Stored at `~/.config/medialib/config.json`; a few values can
//! be overridden from the environment (see `apply_env`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::SearchQuery;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "medialib";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default minutes between background sync passes
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 5;

/// Default page size for listing calls
pub const DEFAULT_PAGE_SIZE: u32 = 500;

const DEFAULT_FOLDER: &str = "portfolios";

const ENV_GATEWAY_URL: &str = "MEDIALIB_GATEWAY_URL";
const ENV_FOLDER: &str = "MEDIALIB_FOLDER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway_url: Option<String>,
    pub folder: String,
    pub sync_interval_minutes: u64,
    pub page_size: u32,
    pub account: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: None,
            folder: DEFAULT_FOLDER.to_string(),
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            page_size: DEFAULT_PAGE_SIZE,
            account: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
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
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides on top of the file values
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_GATEWAY_URL) {
            if !url.is_empty() {
                self.gateway_url = Some(url);
            }
        }
        if let Ok(folder) = std::env::var(ENV_FOLDER) {
            if !folder.is_empty() {
                self.folder = folder;
            }
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(ref account) = self.account {
            path = path.join(account);
        }
        Ok(path)
    }

    pub fn download_dir(&self) -> PathBuf {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads"))
    }

    /// Keychain account name the gateway token is stored under
    pub fn account_name(&self) -> &str {
        self.account.as_deref().unwrap_or("default")
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes.max(1) * 60)
    }

    /// Listing query the sync engine mirrors
    pub fn listing_query(&self) -> SearchQuery {
        SearchQuery::folder(&self.folder, self.page_size.max(1))
    }
}
