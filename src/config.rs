//! Configuration Management
//!
//! Handles persistent settings for the adapter. Values given on the command
//! line take precedence over the config file, which overrides the defaults.

use crate::datasource::compartments::DEFAULT_CACHE_REFRESH;
use crate::datasource::pagination::MAX_METRIC_PAGES;
use crate::datasource::DatasourceOptions;
use crate::oci::region::EndpointOverrides;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "oci-metrics-datasource";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3030";

/// Adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP surface binds to
    pub listen: String,
    /// Seconds a compartment listing stays cached
    pub cache_refresh_secs: u64,
    /// Upper bound on list-metrics calls per lookup
    pub max_metric_pages: usize,
    /// Per-call HTTP timeout, none when unset
    pub http_timeout_secs: Option<u64>,
    pub endpoints: EndpointOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            cache_refresh_secs: DEFAULT_CACHE_REFRESH.as_secs(),
            max_metric_pages: MAX_METRIC_PAGES,
            http_timeout_secs: None,
            endpoints: EndpointOverrides::default(),
        }
    }
}

impl Config {
    /// Directory holding the config file and the log
    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::app_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from the default location; a missing file means defaults
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().context("No config directory on this platform")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    pub fn datasource_options(&self) -> DatasourceOptions {
        DatasourceOptions {
            cache_refresh: Duration::from_secs(self.cache_refresh_secs),
            max_metric_pages: self.max_metric_pages.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"cache_refresh_secs": 300, "endpoints": {"telemetry": "http://localhost:9000"}}"#,
        )
        .unwrap();

        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.max_metric_pages, 20);
        assert_eq!(config.endpoints.telemetry.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.endpoints.identity, None);
        assert_eq!(config.datasource_options().cache_refresh, Duration::from_secs(300));
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = std::env::temp_dir().join(format!("{}-test-{}", APP_DIR, uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("config.json");
        let config = Config {
            listen: "0.0.0.0:8080".to_string(),
            http_timeout_secs: Some(15),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(loaded, config);
        assert_eq!(loaded.http_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("{}-bad-{}", APP_DIR, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ listen").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        std::fs::remove_dir_all(&dir).ok();

        assert!(err.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_zero_page_cap_is_clamped() {
        let config = Config {
            max_metric_pages: 0,
            ..Default::default()
        };
        assert_eq!(config.datasource_options().max_metric_pages, 1);
    }
}
