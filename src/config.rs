// Configuration - View limits and export settings, stored as JSON in the config dir
use crate::view::ViewLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config directory or home directory")]
    NoConfigDir,
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write config: {0}")]
    Write(#[from] std::io::Error),
    #[error("Export delimiter must be a single ASCII character, got {0:?}")]
    BadDelimiter(char),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bars shown in the test-item chart
    pub top_test_items: usize,
    /// Bars shown in the top-errors chart
    pub top_errors: usize,
    pub export_delimiter: char,
    pub export_file_name: String,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            top_test_items: 15,
            top_errors: 10,
            export_delimiter: ',',
            export_file_name: "raw_data_export.csv".to_string(),
            chart_width: 1200,
            chart_height: 800,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/failboard/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .map(|dir| dir.join("failboard").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from `path`, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.export_delimiter.is_ascii() || self.export_delimiter == '"' {
            return Err(ConfigError::BadDelimiter(self.export_delimiter));
        }
        Ok(())
    }

    pub fn view_limits(&self) -> ViewLimits {
        ViewLimits {
            top_test_items: self.top_test_items,
            top_errors: self.top_errors,
        }
    }

    /// Delimiter as a byte, validated on load
    pub fn delimiter_byte(&self) -> u8 {
        if self.export_delimiter.is_ascii() {
            self.export_delimiter as u8
        } else {
            b','
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.view_limits().top_errors, 10);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            top_errors: 5,
            export_delimiter: ';',
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.delimiter_byte(), b';');
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "top_test_items": 3 }"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.top_test_items, 3);
        assert_eq!(config.top_errors, 10);
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, r#"{ "export_delimiter": "\"" }"#).unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::BadDelimiter('"'))
        ));
    }
}
