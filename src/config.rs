//! Configuration management for the search agent.
//!
//! Configuration is read from environment variables (a `.env` file in the
//! working directory is loaded first by the binary):
//! - `TAVILY_API_KEY` - Required. Credential for the Tavily search API.
//! - `TAVILY_BASE_URL` - Optional. Defaults to `https://api.tavily.com`.
//! - `MODEL_NAME` - Optional. Ollama model. Defaults to `qwen3:1.7b-q4_K_M`.
//! - `TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.1`.
//! - `MAX_RESULTS` - Optional. Search results per tool call. Defaults to `3`.
//! - `OLLAMA_BASE_URL` - Optional. Defaults to `http://host.docker.internal:11434`.
//! - `STORE_BACKEND` - Optional. `sqlite` or `memory`. Defaults to `sqlite`.
//! - `DATABASE_PATH` - Optional. SQLite file. Defaults to `data/conversations.db`.
//! - `MAX_ROUNDS` - Optional. Model calls allowed per request. Defaults to `10`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Model and search timeout. Defaults to `120`.
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::llm::DEFAULT_OLLAMA_BASE_URL;
use crate::store::StoreConfig;
use crate::tools::DEFAULT_TAVILY_BASE_URL;

pub const DEFAULT_MODEL_NAME: &str = "qwen3:1.7b-q4_K_M";

/// Round cap used when `MAX_ROUNDS` is unset. A policy choice: enough for
/// a few follow-up searches, small enough to stop a model that never
/// converges.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tavily API key
    pub tavily_api_key: String,

    /// Tavily endpoint
    pub tavily_base_url: String,

    /// Ollama model identifier
    pub model_name: String,

    /// Sampling temperature
    pub temperature: f64,

    /// Maximum search results per tool call
    pub max_results: usize,

    /// Ollama endpoint
    pub ollama_base_url: String,

    /// Conversation storage backend
    pub store: StoreConfig,

    /// Maximum model calls per request
    pub max_rounds: usize,

    /// Timeout applied to every model and search request
    pub request_timeout: Duration,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `TAVILY_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` for values that do not parse or are
    /// out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tavily_api_key = lookup("TAVILY_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("TAVILY_API_KEY".to_string()))?;

        let tavily_base_url =
            lookup("TAVILY_BASE_URL").unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string());

        let model_name = lookup("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());

        let temperature: f64 = parse_or(&lookup, "TEMPERATURE", 0.1)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "TEMPERATURE".to_string(),
                format!("{} is outside 0.0..=2.0", temperature),
            ));
        }

        let max_results: usize = parse_or(&lookup, "MAX_RESULTS", 3)?;
        if max_results == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_RESULTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let ollama_base_url =
            lookup("OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());

        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/conversations.db"));

        let store = match lookup("STORE_BACKEND")
            .unwrap_or_else(|| "sqlite".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "sqlite" => StoreConfig::Sqlite {
                path: database_path,
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("expected `sqlite` or `memory`, got: {}", other),
                ))
            }
        };

        let max_rounds: usize = parse_or(&lookup, "MAX_ROUNDS", DEFAULT_MAX_ROUNDS)?;
        if max_rounds == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ROUNDS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 120)?);

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8000)?;

        Ok(Self {
            tavily_api_key,
            tavily_base_url,
            model_name,
            temperature,
            max_results,
            ollama_base_url,
            store,
            max_rounds,
            request_timeout,
            host,
            port,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(tavily_api_key: String, model_name: String) -> Self {
        Self {
            tavily_api_key,
            tavily_base_url: DEFAULT_TAVILY_BASE_URL.to_string(),
            model_name,
            temperature: 0.1,
            max_results: 3,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            store: StoreConfig::Memory,
            max_rounds: DEFAULT_MAX_ROUNDS,
            request_timeout: Duration::from_secs(120),
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}
