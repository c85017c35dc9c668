//! Configuration file handling.
//!
//! Settings come from `.mapboard.toml` (or an explicit `--config` path)
//! and are then overridden by command-line flags.

use crate::api::ApiSettings;
use crate::models::Viewport;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".mapboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Dataset API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Initial map viewport.
    #[serde(default)]
    pub map: MapConfig,

    /// Date selection defaults.
    #[serde(default)]
    pub date: DateConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host serving `/api/v1/...`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Requested page size for data endpoints; server default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size_hint: Option<u32>,

    /// Retries after a connection failure or timeout.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            page_size_hint: None,
            retries: default_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_longitude")]
    pub longitude: f64,

    #[serde(default = "default_latitude")]
    pub latitude: f64,

    #[serde(default = "default_zoom")]
    pub zoom: f64,

    /// Dashboard address that share links are built on.
    #[serde(default = "default_share_url")]
    pub share_url: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            longitude: default_longitude(),
            latitude: default_latitude(),
            zoom: default_zoom(),
            share_url: default_share_url(),
        }
    }
}

fn default_longitude() -> f64 {
    168.014
}

fn default_latitude() -> f64 {
    -16.741
}

fn default_zoom() -> f64 {
    7.0
}

fn default_share_url() -> String {
    "http://localhost:5173/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateConfig {
    /// Year selected when the link carries none.
    #[serde(default = "default_year")]
    pub default_year: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            default_year: default_year(),
        }
    }
}

fn default_year() -> String {
    "2024".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Group the time series by month when the data varies by month.
    #[serde(default)]
    pub monthly: bool,

    /// Include the per-place statistics table.
    #[serde(default = "default_true")]
    pub include_table: bool,

    /// Include the time series.
    #[serde(default = "default_true")]
    pub include_time_series: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            monthly: false,
            include_table: true,
            include_time_series: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from `dir/.mapboard.toml`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);

        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Try to load configuration from the current directory.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Apply CLI overrides. Only flags the user actually passed win.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if args.monthly {
            self.report.monthly = true;
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api.base_url.clone(),
            timeout_seconds: self.api.timeout_seconds,
            retries: self.api.retries,
            page_size: self.api.page_size_hint,
        }
    }

    /// Viewport shown when the link carries no position.
    pub fn viewport(&self) -> Viewport {
        Viewport {
            longitude: self.map.longitude,
            latitude: self.map.latitude,
            zoom: self.map.zoom,
            ..Viewport::default()
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.date.default_year, "2024");
        assert_eq!(config.viewport(), Viewport::default());
        assert!(config.report.include_table);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
[api]
base_url = "https://vanuatu-dashboard.example"
page_size_hint = 500

[map]
zoom = 9.5

[date]
default_year = "2023"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.api.base_url, "https://vanuatu-dashboard.example");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.api_settings().page_size, Some(500));
        assert_eq!(config.map.longitude, 168.014);
        assert_eq!(config.viewport().zoom, 9.5);
        assert_eq!(config.date.default_year, "2023");
        assert!(!config.report.monthly);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[report]\nmonthly = true\ninclude_table = false\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert!(config.report.monthly);
        assert!(!config.report.include_table);
        assert!(config.report.include_time_series);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[api\nbase_url = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config = Config::default();
        let mut args = make_args();
        config.merge_with_args(&args);
        assert_eq!(config.api.base_url, "http://localhost:8000");

        args.api_url = Some("https://api.example".to_string());
        args.timeout = Some(5);
        args.monthly = true;
        config.merge_with_args(&args);
        assert_eq!(config.api.base_url, "https://api.example");
        assert_eq!(config.api.timeout_seconds, 5);
        assert!(config.report.monthly);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[map]"));
        assert!(toml_str.contains("[date]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.date.default_year, "2024");
    }
}
