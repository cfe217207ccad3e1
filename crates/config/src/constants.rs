//! Centralized constants for the site inspector bot
//!
//! Default values used by `Settings` and by components constructed without
//! settings (tests, the ingest tool).

/// Default external service endpoints
pub mod endpoints {
    /// Telegram Bot API
    pub const TELEGRAM_DEFAULT: &str = "https://api.telegram.org";

    /// OpenAI-compatible API (chat, transcription, embeddings)
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";

    /// Local Qdrant
    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6334";

    /// Google Sheets REST API
    pub const SHEETS_DEFAULT: &str = "https://sheets.googleapis.com/v4";

    /// Google OAuth token endpoint
    pub const GOOGLE_TOKEN_DEFAULT: &str = "https://oauth2.googleapis.com/token";
}

/// Model identifiers
pub mod models {
    pub const REASONING_DEFAULT: &str = "gpt-4o";
    pub const TRANSCRIPTION_DEFAULT: &str = "whisper-1";
    pub const EMBEDDING_DEFAULT: &str = "text-embedding-3-small";
    pub const EMBEDDING_DIM: usize = 1536;
    pub const TEMPERATURE: f32 = 0.3;
    pub const MAX_TOKENS: usize = 1000;
}

/// Timeouts for external calls (milliseconds)
pub mod timeouts {
    pub const TRANSCRIPTION_MS: u64 = 30_000;
    pub const RETRIEVAL_MS: u64 = 10_000;
    pub const ANALYSIS_MS: u64 = 60_000;
    pub const LOG_APPEND_MS: u64 = 5_000;
    pub const DOWNLOAD_MS: u64 = 20_000;
    /// Telegram long-poll wait (seconds)
    pub const POLL_SECS: u64 = 30;
}

/// Inbound message limits
pub mod limits {
    pub const MIN_TEXT_CHARS: usize = 5;
    pub const MAX_TEXT_CHARS: usize = 1000;
    pub const MIN_VOICE_SECS: u64 = 1;
    pub const MAX_VOICE_SECS: u64 = 60;
    /// Telegram getFile download limit
    pub const MAX_AUDIO_BYTES: u64 = 20 * 1024 * 1024;
    /// Telegram message length limit
    pub const MAX_REPLY_CHARS: usize = 4096;
}

/// Retrieval defaults
pub mod rag {
    pub const COLLECTION: &str = "pipeline_standards";
    pub const DEFAULT_TOP_K: usize = 3;
    pub const MAX_TOP_K: usize = 20;
    /// Candidates fetched per requested result before re-ranking
    pub const OVERSAMPLE: usize = 4;
    pub const MIN_SCORE: f32 = 0.0;
}

/// Retry defaults
pub mod retry {
    pub const MAX_RETRIES: u32 = 1;
    pub const INITIAL_BACKOFF_MS: u64 = 500;
    pub const MAX_BACKOFF_MS: u64 = 8_000;
}

/// Transcription quality floor
pub mod speech {
    pub const LANGUAGE: &str = "ru";
    pub const MIN_CONFIDENCE: f32 = 0.35;
}
