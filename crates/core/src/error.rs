//! Error taxonomy for the inspection pipeline
//!
//! Each pipeline stage owns its error enum. Stage crates convert their
//! internal errors into these at the trait boundary, so the message
//! handler only ever matches on this taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Rejections produced by the validator before any external call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("input is empty")]
    EmptyInput,

    #[error("input too short: {actual} chars, minimum {min}")]
    TooShort { actual: usize, min: usize },

    #[error("input too long: {actual} chars, maximum {max}")]
    TooLong { actual: usize, max: usize },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("audio duration {actual:?} exceeds maximum {max:?}")]
    DurationExceeded { actual: Duration, max: Duration },

    #[error("audio duration {actual:?} below minimum {min:?}")]
    DurationTooShort { actual: Duration, min: Duration },

    #[error("audio file of {actual} bytes exceeds maximum {max}")]
    FileTooLarge { actual: u64, max: u64 },
}

/// Speech-to-text failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    #[error("transcription network error: {0}")]
    Network(String),

    #[error("transcription quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Engine answered but produced empty or low-confidence text.
    #[error("audio is unintelligible (confidence {confidence:.2})")]
    Unintelligible { confidence: f32 },

    #[error("transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("transcription engine error: {0}")]
    Upstream(String),

    #[error("audio could not be fetched: {0}")]
    AudioUnavailable(String),
}

impl TranscriptionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::AudioUnavailable(_))
    }
}

/// Similarity search failures. "No matches" is not an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("similarity index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("query embedding failed: {0}")]
    Embedding(String),

    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),
}

/// Reasoning backend failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("reasoning backend unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Output could not be parsed into the expected structure.
    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    /// Backend refused the request (4xx other than rate limiting).
    #[error("analysis request rejected: {0}")]
    Rejected(String),
}

impl AnalysisError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_) | Self::Timeout(_))
    }
}

/// Interaction log failures. Never shown to the end user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogError {
    #[error("log backend unavailable: {0}")]
    Unavailable(String),

    #[error("log backend rejected the row: {0}")]
    Rejected(String),

    #[error("log append timed out after {0:?}")]
    Timeout(Duration),

    #[error("log writer is closed")]
    Closed,
}

/// Outbound delivery failures on the bot transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("delivery network error: {0}")]
    Network(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Any pipeline error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that a [`crate::RetryPolicy`] may retry.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for TranscriptionError {
    fn is_transient(&self) -> bool {
        TranscriptionError::is_transient(self)
    }
}

impl Transient for AnalysisError {
    fn is_transient(&self) -> bool {
        AnalysisError::is_transient(self)
    }
}

impl Transient for RetrievalError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::IndexUnavailable(_))
    }
}
