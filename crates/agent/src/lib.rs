//! Message handling for the site inspector bot
//!
//! Features:
//! - Per-event state machine over validation, transcription, retrieval,
//!   analysis, logging and reply
//! - `/start`, `/help` and the "report a violation" inline button
//! - HTML reply formatting within the transport message limit
//! - Handler metrics through the `metrics` facade

pub mod event;
pub mod handler;
pub mod metrics;
pub mod reply;
pub mod state;

pub use event::{CallbackAction, Command, EventKind, InboundEvent};
pub use handler::{HandlerComponents, HandlerConfig, MessageHandler};
pub use state::{HandlerState, RunOutcome};
