//! Component seams of the inspection pipeline
//!
//! The message handler only talks to these traits, so every backend can be
//! swapped by configuration or replaced by a fake in tests.
//!
//! ```text
//! Speech:
//!   - AudioFetcher: transport handle → audio bytes
//!   - SpeechToText: audio bytes → transcript
//!
//! Retrieval:
//!   - Retriever: query → ranked regulatory excerpts
//!
//! Reasoning:
//!   - ViolationAnalyzer: description + excerpts → AnalysisResult
//!
//! Logging:
//!   - InteractionLog: append one LogEntry per run
//!
//! Transport:
//!   - ReplyChannel: user-facing messages
//!   - OpsChannel: operator alerts (never shown to users)
//! ```

mod analyzer;
mod channel;
mod log;
mod retriever;
mod speech;

pub use analyzer::ViolationAnalyzer;
pub use channel::{InlineButton, MessageRef, OpsAlert, OpsChannel, OutboundMessage, ReplyChannel, TracingOps};
pub use log::InteractionLog;
pub use retriever::Retriever;
pub use speech::{AudioFetcher, SpeechToText};
