//! Configuration management for the site inspector bot
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.*`, `config/{env}.*`)
//! - Environment variables (SITE_INSPECTOR_ prefix, `__` separator)
//! - Well-known variables such as `TELEGRAM_BOT_TOKEN` and `OPENAI_API_KEY`
//!   used as field defaults

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, EmbedderKind, IndexBackend, LimitsConfig, LlmSettings, LogBackend,
    LogSinkConfig, ObservabilityConfig, RagConfig, RetryConfig, RuntimeEnvironment, ServerConfig,
    Settings, SpeechConfig, TelegramConfig, TimeoutConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
