//! In-memory interaction log for tests and dry runs

use async_trait::async_trait;
use parking_lot::Mutex;

use site_inspector_core::{InteractionLog, LogEntry, LogError};

#[derive(Default)]
pub struct InMemoryLog {
    entries: Mutex<Vec<LogEntry>>,
    /// When set, every append fails with this error
    failure: Mutex<Option<LogError>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log whose appends always fail
    pub fn failing(error: LogError) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(error)),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl InteractionLog for InMemoryLog {
    async fn record(&self, entry: &LogEntry) -> Result<(), LogError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), LogError> {
        match self.failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_inspector_core::{ChatId, PipelineStage, RawInput, UserId, ViolationReport};

    fn entry() -> LogEntry {
        let report = ViolationReport::new(RawInput::Text("x".into()), UserId(1), ChatId(1));
        LogEntry::failure(&report, vec![], PipelineStage::Analysis, "malformed", "m")
    }

    #[tokio::test]
    async fn test_records_in_order() {
        let log = InMemoryLog::new();
        log.record(&entry()).await.unwrap();
        log.record(&entry()).await.unwrap();
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_log() {
        let log = InMemoryLog::failing(LogError::Unavailable("down".into()));
        assert!(log.record(&entry()).await.is_err());
        assert!(log.is_empty());
    }
}
