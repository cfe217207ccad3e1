//! JSON-lines interaction log
//!
//! One `LogEntry` per line. Used for local runs and as an offline fallback
//! when no spreadsheet is configured.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use site_inspector_core::{InteractionLog, LogEntry, LogError};

use crate::PersistenceError;

pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLog {
    /// Open for appending, creating the file and its parent directories
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::info!(path = %path.display(), "Opened interaction log file");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &LogEntry) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl InteractionLog for FileLog {
    async fn record(&self, entry: &LogEntry) -> Result<(), LogError> {
        self.append(entry).await.map_err(LogError::from)
    }

    fn name(&self) -> &str {
        "jsonl_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_inspector_core::{ChatId, PipelineStage, RawInput, UserId, ViolationReport};

    fn entry(text: &str) -> LogEntry {
        let report = ViolationReport::new(RawInput::Text(text.into()), UserId(7), ChatId(7));
        LogEntry::failure(&report, vec![], PipelineStage::Retrieval, "index down", "gpt-4o")
    }

    #[tokio::test]
    async fn test_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("interactions.jsonl");
        let log = FileLog::open(&path).await.unwrap();

        log.record(&entry("первое")).await.unwrap();
        log.record(&entry("второе")).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let rows: Vec<LogEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].input_text, "первое");
        assert_eq!(rows[1].input_text, "второе");
    }

    #[tokio::test]
    async fn test_reopen_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interactions.jsonl");

        FileLog::open(&path).await.unwrap().record(&entry("a")).await.unwrap();
        FileLog::open(&path).await.unwrap().record(&entry("b")).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
