//! # Configuration Management Module
//!
//! Persistent settings stored in the platform config directory.
//! Handles loading, saving, and providing defaults.
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/respira-monitor/config.toml
//! - Linux: ~/.config/respira-monitor/config.toml
//! - Windows: %APPDATA%\respira-monitor\config.toml
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys the
//! user wants to change.

use crate::classifier::ThresholdConfig;
use crate::error::ConfigError;
use crate::telemetry::{FAST_WINDOW_CAPACITY, RATE_WINDOW_CAPACITY};
use crate::transport::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port to open when none is given on the command line
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub poll_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub read_chunk_size: usize,
    pub max_line_bytes: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            error_backoff_ms: 100,
            shutdown_timeout_ms: 1000,
            read_chunk_size: 1024,
            max_line_bytes: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub fast_window: usize,
    pub rate_window: usize,
    pub fast_refresh_ms: u64,
    pub slow_refresh_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            fast_window: FAST_WINDOW_CAPACITY,
            rate_window: RATE_WINDOW_CAPACITY,
            fast_refresh_ms: 100,
            slow_refresh_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub export_dir: PathBuf,
    pub serial: SerialSettings,
    pub ingest: IngestSettings,
    pub display: DisplaySettings,
    pub thresholds: ThresholdConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("respiration_data"),
            serial: SerialSettings::default(),
            ingest: IngestSettings::default(),
            display: DisplaySettings::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("respira-monitor")
            .join("config.toml")
    }

    /// Load config from the platform location, creating a default file if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Save config to the platform location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(ConfigError::ParseFailed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.port, None);
        assert_eq!(config.display.fast_window, 100);
        assert_eq!(config.display.rate_window, 60);
        assert_eq!(config.thresholds.low, 12.0);
        assert_eq!(config.thresholds.high, 25.0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml_str = r#"
            export_dir = "/tmp/breaths"

            [serial]
            port = "/dev/ttyACM0"

            [thresholds]
            high = 30.0
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.export_dir, PathBuf::from("/tmp/breaths"));
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.thresholds.low, 12.0);
        assert_eq!(config.thresholds.high, 30.0);
        assert_eq!(config.ingest, IngestSettings::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.serial.port = Some("COM4".to_string());
        config.ingest.error_backoff_ms = 250;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_reports_parse_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "serial = 12").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }
}
