use async_trait::async_trait;

use crate::error::LogError;
use crate::log_entry::LogEntry;

/// Append-only interaction log
#[async_trait]
pub trait InteractionLog: Send + Sync {
    /// Append one row. Implementations must not reorder or merge rows.
    async fn record(&self, entry: &LogEntry) -> Result<(), LogError>;

    /// Connectivity probe run at startup
    async fn health_check(&self) -> Result<(), LogError> {
        Ok(())
    }

    /// Backend name for logging
    fn name(&self) -> &str;
}
