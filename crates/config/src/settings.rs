//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use site_inspector_core::{AudioFormat, RetryPolicy};

use crate::constants::{endpoints, limits, models, rag, retry, speech, timeouts};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - missing credentials are warnings
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings, built once at startup and passed by reference
/// into each component constructor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Bot transport
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Transcription backend
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Similarity index and embeddings
    #[serde(default)]
    pub rag: RagConfig,

    /// Reasoning backend
    #[serde(default)]
    pub llm: LlmSettings,

    /// Interaction log backend
    #[serde(default)]
    pub log_sink: LogSinkConfig,

    /// Inbound message limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Bounded waits for external calls
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry policy for transient upstream failures
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Health and metrics HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

fn default_true() -> bool {
    true
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    #[serde(default = "default_bot_token")]
    pub bot_token: String,

    /// API base URL
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-poll wait passed to getUpdates (seconds)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Chat that receives operational alerts
    #[serde(default = "default_admin_chat")]
    pub admin_chat_id: Option<i64>,
}

fn default_bot_token() -> String {
    env_or("TELEGRAM_BOT_TOKEN", "")
}

fn default_telegram_api_base() -> String {
    endpoints::TELEGRAM_DEFAULT.to_string()
}

fn default_poll_timeout() -> u64 {
    timeouts::POLL_SECS
}

fn default_admin_chat() -> Option<i64> {
    std::env::var("TELEGRAM_ADMIN_CHAT_ID")
        .ok()
        .and_then(|v| v.trim().parse().ok())
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: default_bot_token(),
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout(),
            admin_chat_id: default_admin_chat(),
        }
    }
}

/// Transcription backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_openai_key")]
    pub api_key: String,

    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Language hint sent with every request
    #[serde(default = "default_language")]
    pub language: String,

    /// Transcripts below this confidence are treated as unintelligible
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

fn default_openai_endpoint() -> String {
    env_or("OPENAI_BASE_URL", endpoints::OPENAI_DEFAULT)
}

fn default_openai_key() -> String {
    env_or("OPENAI_API_KEY", "")
}

fn default_transcription_model() -> String {
    models::TRANSCRIPTION_DEFAULT.to_string()
}

fn default_language() -> String {
    speech::LANGUAGE.to_string()
}

fn default_min_confidence() -> f32 {
    speech::MIN_CONFIDENCE
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: default_openai_endpoint(),
            api_key: default_openai_key(),
            model: default_transcription_model(),
            language: default_language(),
            min_confidence: default_min_confidence(),
        }
    }
}

/// Where the similarity index lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Loaded from knowledge files at startup
    #[default]
    Memory,
    Qdrant,
}

/// How query and excerpt embeddings are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// OpenAI-compatible `/embeddings`
    #[default]
    Http,
    /// Local hashed bag-of-characters, for offline development
    Hash,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub backend: IndexBackend,

    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Directory of YAML/JSON regulation files
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: String,

    #[serde(default)]
    pub embedder: EmbedderKind,

    #[serde(default = "default_openai_endpoint")]
    pub embedding_endpoint: String,

    #[serde(default = "default_openai_key")]
    pub embedding_api_key: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Excerpts handed to the analysis step
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Excerpts scoring below this are dropped
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Candidates fetched per requested excerpt before re-ranking
    #[serde(default = "default_oversample")]
    pub oversample: usize,
}

fn default_qdrant_endpoint() -> String {
    env_or("QDRANT_URL", endpoints::QDRANT_DEFAULT)
}

fn default_collection() -> String {
    rag::COLLECTION.to_string()
}

fn default_knowledge_dir() -> String {
    env_or("RAG_DATABASE_PATH", "knowledge")
}

fn default_embedding_model() -> String {
    models::EMBEDDING_DEFAULT.to_string()
}

fn default_embedding_dim() -> usize {
    models::EMBEDDING_DIM
}

fn default_top_k() -> usize {
    rag::DEFAULT_TOP_K
}

fn default_min_score() -> f32 {
    rag::MIN_SCORE
}

fn default_oversample() -> usize {
    rag::OVERSAMPLE
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_api_key: None,
            collection: default_collection(),
            knowledge_dir: default_knowledge_dir(),
            embedder: EmbedderKind::default(),
            embedding_endpoint: default_openai_endpoint(),
            embedding_api_key: default_openai_key(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            top_k: default_top_k(),
            min_score: default_min_score(),
            oversample: default_oversample(),
        }
    }
}

/// Reasoning backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_openai_key")]
    pub api_key: String,

    #[serde(default = "default_reasoning_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_reasoning_model() -> String {
    env_or("OPENAI_MODEL", models::REASONING_DEFAULT)
}

fn default_temperature() -> f32 {
    models::TEMPERATURE
}

fn default_max_tokens() -> usize {
    models::MAX_TOKENS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_openai_endpoint(),
            api_key: default_openai_key(),
            model: default_reasoning_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Interaction log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    /// Google Sheets `values:append`
    #[default]
    Sheets,
    /// JSON lines file
    File,
    /// Process memory (tests, dry runs)
    Memory,
}

/// Interaction log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSinkConfig {
    #[serde(default)]
    pub backend: LogBackend,

    /// Service-account JSON key file
    #[serde(default = "default_sheets_credentials")]
    pub credentials_file: String,

    #[serde(default = "default_spreadsheet_id")]
    pub spreadsheet_id: String,

    /// Target range, rows are appended after the last filled row
    #[serde(default = "default_sheet_range")]
    pub sheet_range: String,

    #[serde(default = "default_sheets_endpoint")]
    pub sheets_endpoint: String,

    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// JSONL path for the file backend
    #[serde(default = "default_log_file")]
    pub file_path: String,

    /// Pending rows held by the single-writer queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_sheets_credentials() -> String {
    env_or("GOOGLE_SHEETS_CREDENTIALS_FILE", "credentials.json")
}

fn default_spreadsheet_id() -> String {
    env_or("GOOGLE_SHEETS_SPREADSHEET_ID", "")
}

fn default_sheet_range() -> String {
    "Sheet1!A1".to_string()
}

fn default_sheets_endpoint() -> String {
    endpoints::SHEETS_DEFAULT.to_string()
}

fn default_token_endpoint() -> String {
    endpoints::GOOGLE_TOKEN_DEFAULT.to_string()
}

fn default_log_file() -> String {
    "logs/interactions.jsonl".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            backend: LogBackend::default(),
            credentials_file: default_sheets_credentials(),
            spreadsheet_id: default_spreadsheet_id(),
            sheet_range: default_sheet_range(),
            sheets_endpoint: default_sheets_endpoint(),
            token_endpoint: default_token_endpoint(),
            file_path: default_log_file(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Inbound message limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_min_text")]
    pub min_text_chars: usize,

    #[serde(default = "default_max_text")]
    pub max_text_chars: usize,

    #[serde(default = "default_min_voice")]
    pub min_voice_secs: u64,

    #[serde(default = "default_max_voice")]
    pub max_voice_secs: u64,

    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: u64,

    #[serde(default = "default_accepted_formats")]
    pub accepted_formats: Vec<AudioFormat>,
}

fn default_min_text() -> usize {
    limits::MIN_TEXT_CHARS
}

fn default_max_text() -> usize {
    limits::MAX_TEXT_CHARS
}

fn default_min_voice() -> u64 {
    limits::MIN_VOICE_SECS
}

fn default_max_voice() -> u64 {
    env_parse_or("MAX_VOICE_DURATION", limits::MAX_VOICE_SECS)
}

fn default_max_audio_bytes() -> u64 {
    limits::MAX_AUDIO_BYTES
}

fn default_accepted_formats() -> Vec<AudioFormat> {
    vec![
        AudioFormat::OggOpus,
        AudioFormat::Mp3,
        AudioFormat::Wav,
        AudioFormat::M4a,
        AudioFormat::Webm,
    ]
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text(),
            max_text_chars: default_max_text(),
            min_voice_secs: default_min_voice(),
            max_voice_secs: default_max_voice(),
            max_audio_bytes: default_max_audio_bytes(),
            accepted_formats: default_accepted_formats(),
        }
    }
}

/// Bounded waits for every external call (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_transcription_ms")]
    pub transcription_ms: u64,

    #[serde(default = "default_retrieval_ms")]
    pub retrieval_ms: u64,

    #[serde(default = "default_analysis_ms")]
    pub analysis_ms: u64,

    #[serde(default = "default_log_append_ms")]
    pub log_append_ms: u64,

    #[serde(default = "default_download_ms")]
    pub download_ms: u64,
}

fn default_transcription_ms() -> u64 {
    timeouts::TRANSCRIPTION_MS
}

fn default_retrieval_ms() -> u64 {
    timeouts::RETRIEVAL_MS
}

fn default_analysis_ms() -> u64 {
    timeouts::ANALYSIS_MS
}

fn default_log_append_ms() -> u64 {
    timeouts::LOG_APPEND_MS
}

fn default_download_ms() -> u64 {
    timeouts::DOWNLOAD_MS
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            transcription_ms: default_transcription_ms(),
            retrieval_ms: default_retrieval_ms(),
            analysis_ms: default_analysis_ms(),
            log_append_ms: default_log_append_ms(),
            download_ms: default_download_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn transcription(&self) -> Duration {
        Duration::from_millis(self.transcription_ms)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_millis(self.retrieval_ms)
    }

    pub fn analysis(&self) -> Duration {
        Duration::from_millis(self.analysis_ms)
    }

    pub fn log_append(&self) -> Duration {
        Duration::from_millis(self.log_append_ms)
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }
}

/// Retry policy for transient upstream errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    env_parse_or("MAX_RETRIES", retry::MAX_RETRIES)
}

fn default_initial_backoff_ms() -> u64 {
    retry::INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    retry::MAX_BACKOFF_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    env_or("LOG_LEVEL", "info").to_lowercase()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Health/metrics HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve /health and /metrics at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_credentials()?;
        self.validate_limits()?;
        self.validate_rag()?;
        self.validate_timeouts()?;
        self.validate_server()?;
        Ok(())
    }

    /// Credentials are mandatory in staging/production, warnings otherwise
    fn validate_credentials(&self) -> Result<(), ConfigError> {
        let mut required = vec![
            ("telegram.bot_token", self.telegram.bot_token.as_str()),
            ("llm.api_key", self.llm.api_key.as_str()),
            ("speech.api_key", self.speech.api_key.as_str()),
        ];
        if self.log_sink.backend == LogBackend::Sheets {
            required.push(("log_sink.credentials_file", self.log_sink.credentials_file.as_str()));
            required.push(("log_sink.spreadsheet_id", self.log_sink.spreadsheet_id.as_str()));
        }
        if self.rag.embedder == EmbedderKind::Http {
            required.push(("rag.embedding_api_key", self.rag.embedding_api_key.as_str()));
        }

        for (field, value) in required {
            if value.trim().is_empty() {
                if self.environment.is_strict() {
                    return Err(ConfigError::MissingField(field.to_string()));
                }
                tracing::warn!("{}: not configured (required outside development)", field);
            }
        }

        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;

        if limits.max_text_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_text_chars".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if limits.min_text_chars > limits.max_text_chars {
            return Err(ConfigError::InvalidValue {
                field: "limits.min_text_chars".to_string(),
                message: format!(
                    "Cannot be larger than max_text_chars ({})",
                    limits.max_text_chars
                ),
            });
        }

        if limits.max_voice_secs == 0 || limits.min_voice_secs > limits.max_voice_secs {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_voice_secs".to_string(),
                message: format!(
                    "Must be positive and at least min_voice_secs ({})",
                    limits.min_voice_secs
                ),
            });
        }

        if limits.accepted_formats.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "limits.accepted_formats".to_string(),
                message: "At least one audio format must be accepted".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.speech.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "speech.min_confidence".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", self.speech.min_confidence),
            });
        }

        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.top_k == 0 || rag.top_k > rag::MAX_TOP_K {
            return Err(ConfigError::InvalidValue {
                field: "rag.top_k".to_string(),
                message: format!("Must be between 1 and {}, got {}", rag::MAX_TOP_K, rag.top_k),
            });
        }

        if rag.oversample == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.oversample".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&rag.min_score) {
            return Err(ConfigError::InvalidValue {
                field: "rag.min_score".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", rag.min_score),
            });
        }

        if rag.embedding_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.embedding_dim".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }

        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        let t = &self.timeouts;
        let all = [
            ("timeouts.transcription_ms", t.transcription_ms),
            ("timeouts.retrieval_ms", t.retrieval_ms),
            ("timeouts.analysis_ms", t.analysis_ms),
            ("timeouts.log_append_ms", t.log_append_ms),
            ("timeouts.download_ms", t.download_ms),
        ];
        for (field, value) in all {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Timeout must be positive".to_string(),
                });
            }
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.initial_backoff_ms".to_string(),
                message: format!(
                    "Cannot be larger than max_backoff_ms ({})",
                    self.retry.max_backoff_ms
                ),
            });
        }

        if self.log_sink.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "log_sink.queue_capacity".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.enabled && self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from `config/` and the environment
///
/// Priority: env vars > config/{env}.* > config/default.* > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings with an explicit configuration directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("SITE_INSPECTOR")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
