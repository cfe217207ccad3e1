//! Site Inspector Server
//!
//! Telegram long-poll transport, per-chat event dispatch and the
//! health/metrics HTTP endpoints.

pub mod dispatcher;
pub mod http;
pub mod metrics;
pub mod state;
pub mod telegram;

pub use dispatcher::Dispatcher;
pub use http::create_router;
pub use metrics::{init_metrics, record_poll_error, record_superseded, record_update};
pub use state::AppState;
pub use telegram::{BotApiConfig, Poller, TelegramBot, TelegramError, TelegramOps};

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("Startup error: {0}")]
    Startup(String),
}
