//! Core traits and types for the site inspector bot
//!
//! This crate provides foundational types used across all other crates:
//! - Violation reports, retrieved excerpts, analysis results and log rows
//! - Audio container detection
//! - The error taxonomy of the pipeline
//! - Retry policy for external calls
//! - Traits for pluggable backends (STT, retrieval, reasoning, logging, transport)

pub mod analysis;
pub mod audio;
pub mod document;
pub mod error;
pub mod log_entry;
pub mod report;
pub mod retry;
pub mod traits;
pub mod transcript;

pub use analysis::{AnalysisResult, Severity};
pub use audio::{AudioFormat, AudioMeta, AudioPayload};
pub use document::{truncate_chars, RetrievedDocument, SourceReference};
pub use error::{
    AnalysisError, DeliveryError, Error, LogError, Result, RetrievalError, TranscriptionError,
    Transient, ValidationError,
};
pub use log_entry::{LogEntry, PipelineStage, RunStatus};
pub use report::{AudioRef, ChatId, InputKind, RawInput, UserId, ViolationReport};
pub use retry::RetryPolicy;
pub use transcript::Transcript;

pub use traits::{
    AudioFetcher, InlineButton, InteractionLog, MessageRef, OpsAlert, OpsChannel,
    OutboundMessage, ReplyChannel, Retriever, SpeechToText, TracingOps, ViolationAnalyzer,
};
