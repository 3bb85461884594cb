use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const APP_NAME: &str = "medimate";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_STAGE_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid API base URL {0:?}: must be an http or https URL")]
    InvalidBaseUrl(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Compact,
    #[default]
    Comfortable,
    Spacious,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub stage_delay_ms: u64,
    pub density: Density,
    pub date_format: String,
    pub time_format: String,
    pub history_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            stage_delay_ms: DEFAULT_STAGE_DELAY_MS,
            density: Density::default(),
            date_format: "%B %-d, %Y".to_string(),
            time_format: "%H:%M".to_string(),
            history_limit: 100,
        }
    }
}

impl AppConfig {
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `MEDIMATE_*` overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MEDIMATE_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(value) = lookup("MEDIMATE_TIMEOUT_MS") {
            self.request_timeout_ms = parse_number("MEDIMATE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("MEDIMATE_STAGE_DELAY_MS") {
            self.stage_delay_ms = parse_number("MEDIMATE_STAGE_DELAY_MS", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "request_timeout_ms",
                value: "0".to_string(),
            });
        }
        for (name, format) in [
            ("date_format", &self.date_format),
            ("time_format", &self.time_format),
        ] {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(ConfigError::InvalidValue {
                    name,
                    value: format.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.api_base_url.clone()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(ConfigError::InvalidBaseUrl(self.api_base_url.clone())),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}
