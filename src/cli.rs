//! Command-line arguments and configuration resolution.
//!
//! Priority: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{AppConfig, ConfigError, Density};

/// MediMate: ask medication questions answered from drug label documents.
#[derive(Parser, Debug)]
#[command(name = "medimate", version, about)]
pub struct CliArgs {
    /// Path to a JSON configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the RAG chat service.
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    /// Request timeout in milliseconds.
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// How long the first progress stage is shown, in milliseconds.
    #[arg(long = "stage-delay-ms")]
    pub stage_delay_ms: Option<u64>,

    /// Message spacing.
    #[arg(long = "density", value_enum)]
    pub density: Option<Density>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Ask one question, print the conversation and exit.
    #[arg(long = "ask")]
    pub ask: Option<String>,
}

impl CliArgs {
    /// Config file path: --config flag > MEDIMATE_CONFIG.
    pub fn config_path<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.config
            .clone()
            .or_else(|| lookup("MEDIMATE_CONFIG").map(PathBuf::from))
    }

    /// Build the effective configuration. A missing file is an error only
    /// when a path was given.
    pub fn resolve_config<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path(&lookup) {
            Some(path) => AppConfig::load_file(&path)?,
            None => AppConfig::default(),
        };
        config.apply_env(&lookup)?;

        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(timeout) = self.timeout_ms {
            config.request_timeout_ms = timeout;
        }
        if let Some(delay) = self.stage_delay_ms {
            config.stage_delay_ms = delay;
        }
        if let Some(density) = self.density {
            config.density = density;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_flags_or_env() {
        let args = CliArgs::parse_from(["medimate"]);
        let config = args.resolve_config(env(&[])).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout_ms, 20_000);
        assert_eq!(config.stage_delay_ms, 500);
        assert!(args.ask.is_none());
    }

    #[test]
    fn test_flags_beat_env_beat_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_base_url": "http://file:1", "request_timeout_ms": 1000, "stage_delay_ms": 10, "density": "compact"}}"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = CliArgs::parse_from(["medimate", "--stage-delay-ms", "900"]);
        let config = args
            .resolve_config(env(&[
                ("MEDIMATE_CONFIG", path.as_str()),
                ("MEDIMATE_TIMEOUT_MS", "5000"),
            ]))
            .unwrap();

        assert_eq!(config.api_base_url, "http://file:1");
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.stage_delay_ms, 900);
        assert_eq!(config.density, Density::Compact);
    }

    #[test]
    fn test_config_flag_beats_env_path() {
        let args = CliArgs::parse_from(["medimate", "--config", "/from/flag.json"]);
        let path = args.config_path(&env(&[("MEDIMATE_CONFIG", "/from/env.json")]));
        assert_eq!(path, Some(PathBuf::from("/from/flag.json")));
    }

    #[test]
    fn test_invalid_url_flag_is_rejected() {
        let args = CliArgs::parse_from(["medimate", "--api-url", "ftp://example.com"]);
        assert!(matches!(
            args.resolve_config(env(&[])),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = CliArgs::parse_from(["medimate", "--config", "/nonexistent/medimate.json"]);
        assert!(matches!(
            args.resolve_config(env(&[])),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_density_and_ask_flags() {
        let args = CliArgs::parse_from(["medimate", "--density", "spacious", "--ask", "Is it safe?"]);
        assert_eq!(args.density, Some(Density::Spacious));
        assert_eq!(args.ask.as_deref(), Some("Is it safe?"));
    }
}
