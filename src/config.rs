//! Configuration System
//!
//! Handles loading configuration from TOML files with environment variable
//! overrides. Every section has full defaults, so an empty file (or no file
//! at all) yields a working setup.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::rules::parse_policy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compaction rule configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    /// Policy string applied to series created without explicit rules,
    /// e.g. `"avg:1h;max:1d"`. Unset means no automatic compaction.
    #[serde(default)]
    pub default_policy: Option<String>,
}

/// Query engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_result_samples")]
    pub max_result_samples: usize,
}

fn default_max_result_samples() -> usize {
    1_000_000
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_result_samples: default_max_result_samples(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location or environment
    pub fn load_default() -> Self {
        let path = PathBuf::from("./tideline.toml");
        if path.exists() {
            match Self::load_with_env(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {:?}: {}", path, e);
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Reject configurations that would fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(policy) = &self.rules.default_policy {
            parse_policy(policy).map_err(|e| ConfigError::Invalid {
                field: "rules.default_policy".to_string(),
                error: e.to_string(),
            })?;
        }
        if self.query.max_result_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "query.max_result_samples".to_string(),
                error: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(policy) = std::env::var("TIDELINE_DEFAULT_POLICY") {
            self.rules.default_policy = Some(policy);
        }
        if let Ok(max) = std::env::var("TIDELINE_MAX_RESULT_SAMPLES") {
            if let Ok(n) = max.parse() {
                self.query.max_result_samples = n;
            }
        }
        if let Ok(level) = std::env::var("TIDELINE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TIDELINE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: String, error: String },
}
