//! Runtime configuration.
//!
//! Precedence is `ESTATE_*` environment variables over the TOML file over
//! built-in defaults. Missing keys in the file keep their defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "ESTATE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value `{value}` for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstateConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Absolute directory for rotated log files.
    pub log_dir: PathBuf,
    /// ISO 4217 code used when formatting amounts.
    pub currency: String,
    pub table_page_size: u32,
    pub grid_page_size: u32,
    pub notification_page_size: u32,
    /// How far ahead expiry and payment alerts look.
    pub notification_lookahead_days: u32,
}

impl Default for EstateConfig {
    fn default() -> Self {
        let data_dir = std::env::temp_dir().join("estate");
        Self {
            db_path: PathBuf::from("estate.sqlite3"),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: data_dir.join("logs"),
            currency: "USD".to_string(),
            table_page_size: crate::repo::property_repo::TABLE_PAGE_SIZE,
            grid_page_size: crate::repo::property_repo::GRID_PAGE_SIZE,
            notification_page_size: crate::repo::notification_repo::NOTIFICATION_PAGE_SIZE,
            notification_lookahead_days: 30,
        }
    }
}

impl EstateConfig {
    /// Loads `path` (when it exists) and applies the process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let contents = match path {
            Some(path) if path.exists() => {
                Some(std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?)
            }
            _ => None,
        };
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        Self::from_sources(contents.as_deref(), &env)
    }

    /// Builds a config from raw TOML and an environment map, then validates it.
    pub fn from_sources(toml_text: Option<&str>, env: &HashMap<String, String>) -> ConfigResult<Self> {
        let mut config = match toml_text {
            Some(text) => toml::from_str(text)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: &HashMap<String, String>) -> ConfigResult<()> {
        if let Some(value) = env.get("ESTATE_DB_PATH") {
            self.db_path = PathBuf::from(value);
        }
        if let Some(value) = env.get("ESTATE_LOG_LEVEL") {
            self.log_level = value.clone();
        }
        if let Some(value) = env.get("ESTATE_LOG_DIR") {
            self.log_dir = PathBuf::from(value);
        }
        if let Some(value) = env.get("ESTATE_CURRENCY") {
            self.currency = value.trim().to_ascii_uppercase();
        }
        if let Some(value) = env.get("ESTATE_TABLE_PAGE_SIZE") {
            self.table_page_size = parse_u32(value, "table_page_size")?;
        }
        if let Some(value) = env.get("ESTATE_GRID_PAGE_SIZE") {
            self.grid_page_size = parse_u32(value, "grid_page_size")?;
        }
        if let Some(value) = env.get("ESTATE_NOTIFICATION_PAGE_SIZE") {
            self.notification_page_size = parse_u32(value, "notification_page_size")?;
        }
        if let Some(value) = env.get("ESTATE_NOTIFICATION_LOOKAHEAD_DAYS") {
            self.notification_lookahead_days = parse_u32(value, "notification_lookahead_days")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(invalid("db_path", "", "must not be empty"));
        }
        if !matches!(
            self.log_level.trim().to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            return Err(invalid(
                "log_level",
                &self.log_level,
                "expected trace|debug|info|warn|error",
            ));
        }
        if !self.log_dir.is_absolute() {
            return Err(invalid(
                "log_dir",
                &self.log_dir.display().to_string(),
                "must be an absolute path",
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(invalid("currency", &self.currency, "expected a three-letter code"));
        }
        for (field, value) in [
            ("table_page_size", self.table_page_size),
            ("grid_page_size", self.grid_page_size),
            ("notification_page_size", self.notification_page_size),
        ] {
            if value == 0 || value > 500 {
                return Err(invalid(field, &value.to_string(), "expected 1..=500"));
            }
        }
        if self.notification_lookahead_days > 365 {
            return Err(invalid(
                "notification_lookahead_days",
                &self.notification_lookahead_days.to_string(),
                "expected at most 365",
            ));
        }
        Ok(())
    }
}

fn parse_u32(value: &str, field: &'static str) -> ConfigResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(field, value, "expected an unsigned integer"))
}

fn invalid(field: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        field,
        value: value.to_string(),
        reason,
    }
}
