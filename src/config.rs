use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

const APP_DIR: &str = "jarvis-chat";

/// Settings persisted in `<config dir>/jarvis-chat/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Effective settings after flags, environment and the config file are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// A missing file is an empty config, not an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Flag/env values win over the file; the file wins over built-in defaults.
    pub fn resolve(&self, api_url: Option<String>, timeout_secs: Option<u64>) -> Settings {
        let api_base_url = api_url
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let request_timeout = timeout_secs
            .or(self.request_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let log_dir = self.log_dir.clone().or_else(default_log_dir);

        Settings {
            api_base_url,
            request_timeout,
            log_dir,
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR).join("config.json"))
    }
}

fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_base_url: Some("http://jarvis.local:8080/api".to_string()),
            request_timeout_secs: Some(15),
            log_dir: None,
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("log_dir"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_resolve_precedence() {
        let config = Config {
            api_base_url: Some("http://from-file/api".to_string()),
            request_timeout_secs: Some(5),
            log_dir: Some(PathBuf::from("/tmp/jarvis-logs")),
        };

        let from_file = config.resolve(None, None);
        assert_eq!(from_file.api_base_url, "http://from-file/api");
        assert_eq!(from_file.request_timeout, Duration::from_secs(5));
        assert_eq!(from_file.log_dir, Some(PathBuf::from("/tmp/jarvis-logs")));

        let overridden = config.resolve(Some("http://flag/api".to_string()), Some(90));
        assert_eq!(overridden.api_base_url, "http://flag/api");
        assert_eq!(overridden.request_timeout, Duration::from_secs(90));

        let defaults = Config::default().resolve(None, None);
        assert_eq!(defaults.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(defaults.request_timeout, DEFAULT_TIMEOUT);
    }
}
