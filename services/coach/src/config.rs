//! services/coach/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Failed to read {0}: {1}")]
    Unreadable(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub database_url: String,
    pub log_level: Level,
    pub api_base: String,
    pub openai_api_key: Option<String>,
    pub model: String,
    pub max_output_tokens: u32,
    /// Replaces the built-in coaching instructions when set.
    pub instructions: Option<String>,
    pub max_dimension: u32,
    pub update_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Storage Settings ---
        let data_dir = lookup("COACH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            format!("sqlite://{}", data_dir.join("coach.db").display())
        });

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Feedback API Settings ---
        let api_base = lookup("OPENAI_API_BASE")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        let model = lookup("COACH_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let max_output_tokens = parse_or("COACH_MAX_OUTPUT_TOKENS", &lookup, 500)?;

        let instructions = match lookup("COACH_INSTRUCTIONS_PATH") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                ConfigError::Unreadable(path.clone(), e.to_string())
            })?),
            None => None,
        };

        // --- Session Settings ---
        let max_dimension = parse_or("COACH_MAX_DIMENSION", &lookup, 1024)?;
        let update_interval =
            Duration::from_millis(parse_or("COACH_UPDATE_INTERVAL_MS", &lookup, 100)?);

        Ok(Self {
            data_dir,
            database_url,
            log_level,
            api_base,
            openai_api_key,
            model,
            max_output_tokens,
            instructions,
            max_dimension,
            update_interval,
        })
    }
}

fn parse_or<T, F>(name: &str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
