//! Inbound processing for the site inspector bot
//!
//! Features:
//! - Validation of text and voice reports before any external call
//! - Voice processing with bounded waits, retry and confidence gating
//! - OpenAI-compatible Whisper transcription backend

pub mod stt;
pub mod validator;
pub mod voice;

pub use stt::{WhisperConfig, WhisperStt};
pub use validator::{normalize_text, NormalizedInput, ValidationLimits, Validator};
pub use voice::{VoiceProcessor, VoiceProcessorConfig};

use site_inspector_core::TranscriptionError;
use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::Timeout(err.to_string())
        } else if err.is_decode() {
            PipelineError::InvalidResponse(err.to_string())
        } else {
            PipelineError::Network(err.to_string())
        }
    }
}

impl From<PipelineError> for TranscriptionError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Network(msg) | PipelineError::RateLimited(msg) => {
                TranscriptionError::Network(msg)
            }
            PipelineError::Timeout(msg) => TranscriptionError::Network(format!("timeout: {}", msg)),
            PipelineError::Quota(msg) => TranscriptionError::QuotaExceeded(msg),
            PipelineError::Api { status, message } if status >= 500 => {
                TranscriptionError::Network(format!("{}: {}", status, message))
            }
            other => TranscriptionError::Upstream(other.to_string()),
        }
    }
}
