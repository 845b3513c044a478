//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the reading plan location, the verse API endpoint and
//! translation, the optional sync endpoint, and the last signed-in user.
//!
//! Configuration is stored at `~/.config/bibleplan/config.json`. A handful of
//! environment variables override the stored values so a `.env` file can be
//! used during development.

use std::path::{Path, PathBuf};

use anyhow::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "bibleplan";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Public verse API used when nothing else is configured
pub const DEFAULT_API_BASE: &str = "https://bible-api.com";

/// Translation requested from the verse API
pub const DEFAULT_TRANSLATION: &str = "kjv";

const ENV_PLAN_URL: &str = "BIBLEPLAN_PLAN_URL";
const ENV_SYNC_URL: &str = "BIBLEPLAN_SYNC_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where to fetch `plan.json` from. The bundled plan is used when unset.
    #[serde(default)]
    pub plan_url: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_translation")]
    pub translation: String,
    /// Base URL of the remote progress document store.
    #[serde(default)]
    pub sync_url: Option<String>,
    #[serde(default)]
    pub last_user: Option<String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_translation() -> String {
    DEFAULT_TRANSLATION.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plan_url: None,
            api_base: default_api_base(),
            translation: default_translation(),
            sync_url: None,
            last_user: None,
        }
    }
}

impl Config {
    /// Load the config with environment overrides applied.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_stored()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load the config as saved on disk. Anything that is saved back must
    /// start from this, or overrides would be written to the file.
    pub fn load_stored() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(url) = value(ENV_PLAN_URL) {
            self.plan_url = Some(url);
        }
        if let Some(url) = value(ENV_SYNC_URL) {
            self.sync_url = Some(url);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding local storage, the session file and cache buckets.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn api_base_url(&self) -> Result<Url> {
        Url::parse(&self.api_base)
            .map_err(|e| anyhow::anyhow!("Invalid api_base {:?}: {}", self.api_base, e))
    }

    pub fn plan_url(&self) -> Result<Option<Url>> {
        parse_optional_url("plan_url", self.plan_url.as_deref())
    }

    pub fn sync_url(&self) -> Result<Option<Url>> {
        parse_optional_url("sync_url", self.sync_url.as_deref())
    }
}

fn parse_optional_url(field: &str, value: Option<&str>) -> Result<Option<Url>> {
    match value {
        Some(raw) if !raw.trim().is_empty() => Url::parse(raw.trim())
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {} {:?}: {}", field, raw, e)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.translation, DEFAULT_TRANSLATION);
        assert!(config.plan_url.is_none());
        assert!(config.sync_url.is_none());
    }

    #[test]
    fn test_optional_urls() {
        let config = Config {
            plan_url: Some("https://example.org/plan.json".to_string()),
            sync_url: Some("  ".to_string()),
            ..Config::default()
        };
        let plan = config.plan_url().unwrap().unwrap();
        assert_eq!(plan.host_str(), Some("example.org"));
        assert!(config.sync_url().unwrap().is_none());

        let broken = Config {
            sync_url: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(broken.sync_url().is_err());
    }

    #[test]
    fn test_overrides_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        Config::default().save_to(&path).unwrap();

        let mut effective = Config::load_from(&path).unwrap();
        effective.apply_overrides(|key| {
            (key == ENV_PLAN_URL).then(|| " https://dev.example.org/plan.json ".to_string())
        });
        assert_eq!(
            effective.plan_url.as_deref(),
            Some("https://dev.example.org/plan.json")
        );
        assert!(effective.sync_url.is_none());

        let mut stored = Config::load_from(&path).unwrap();
        stored.last_user = Some("reader-7".to_string());
        stored.save_to(&path).unwrap();

        let reread = Config::load_from(&path).unwrap();
        assert!(reread.plan_url.is_none());
        assert_eq!(reread.last_user.as_deref(), Some("reader-7"));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.last_user.is_none());
    }
}
