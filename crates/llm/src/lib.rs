//! Reasoning backend integration
//!
//! Features:
//! - OpenAI-compatible chat completions backend with JSON-object output
//! - Prompt construction from the violation description and regulation excerpts
//! - Strict parsing of the model answer into an `AnalysisResult`
//! - Core ViolationAnalyzer implementation with timeout and bounded retry

pub mod analysis;
pub mod backend;
pub mod parser;
pub mod prompt;

pub use analysis::{AnalysisService, AnalysisServiceConfig};
pub use backend::{GenerationResult, FinishReason, LlmBackend, OpenAIBackend, OpenAIConfig};
pub use parser::parse_analysis;
pub use prompt::{format_context, Message, PromptBuilder, Role};

use site_inspector_core::AnalysisError;
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Network trouble, rate limits, quota and 5xx are "unavailable"; other
/// 4xx means the request itself was refused.
impl From<LlmError> for AnalysisError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Network(_)
            | LlmError::Timeout
            | LlmError::RateLimited(_)
            | LlmError::Quota(_) => AnalysisError::UpstreamUnavailable(err.to_string()),
            LlmError::Api { status, .. } if status >= 500 => {
                AnalysisError::UpstreamUnavailable(err.to_string())
            },
            LlmError::Api { .. } | LlmError::Configuration(_) => {
                AnalysisError::Rejected(err.to_string())
            },
            LlmError::InvalidResponse(msg) => AnalysisError::MalformedResponse(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(AnalysisError::from(LlmError::Quota("q".into())).is_transient());
        assert!(AnalysisError::from(LlmError::Api {
            status: 502,
            message: "bad gateway".into()
        })
        .is_transient());
        assert!(matches!(
            AnalysisError::from(LlmError::Api {
                status: 400,
                message: "bad".into()
            }),
            AnalysisError::Rejected(_)
        ));
        assert!(matches!(
            AnalysisError::from(LlmError::InvalidResponse("x".into())),
            AnalysisError::MalformedResponse(_)
        ));
    }
}
