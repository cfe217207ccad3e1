//! Interaction log backends for the site inspector bot
//!
//! Every pipeline run that gets past validation appends exactly one row:
//! - Google Sheets (production)
//! - JSON lines file (local runs)
//! - In-memory (tests)
//!
//! Whatever the backend, writes go through a [`QueuedLog`] so only one
//! append is in flight at a time.

pub mod error;
pub mod file;
pub mod memory;
pub mod queue;
pub mod sheets;

pub use error::PersistenceError;
pub use file::FileLog;
pub use memory::InMemoryLog;
pub use queue::QueuedLog;
pub use sheets::{
    ServiceAccountKey, ServiceAccountTokens, SheetsConfig, SheetsLog, StaticToken, TokenSource,
};

use std::sync::Arc;

use site_inspector_config::{LogBackend, Settings};
use site_inspector_core::InteractionLog;

/// Build the configured backend behind a single-writer queue
pub async fn build_log(settings: &Settings) -> Result<Arc<dyn InteractionLog>, PersistenceError> {
    let backend: Arc<dyn InteractionLog> = match settings.log_sink.backend {
        LogBackend::Sheets => {
            let sheets = SheetsLog::from_settings(settings)?;
            if let Err(e) = sheets.ensure_header().await {
                tracing::warn!(error = %e, "Could not verify the log header row");
            }
            Arc::new(sheets)
        },
        LogBackend::File => Arc::new(FileLog::open(&settings.log_sink.file_path).await?),
        LogBackend::Memory => Arc::new(InMemoryLog::new()),
    };

    tracing::info!(
        backend = backend.name(),
        queue_capacity = settings.log_sink.queue_capacity,
        "Interaction log ready"
    );

    Ok(Arc::new(QueuedLog::spawn(
        backend,
        settings.log_sink.queue_capacity,
        settings.timeouts.log_append(),
    )))
}
