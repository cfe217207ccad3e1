//! Single-writer log queue
//!
//! Concurrent pipeline runs hand their rows to one worker task, so appends
//! reach the backend one at a time and in submission order. Each caller
//! still waits for its own row's outcome, bounded by the append timeout.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use site_inspector_core::{InteractionLog, LogEntry, LogError};

type Job = (LogEntry, oneshot::Sender<Result<(), LogError>>);

pub struct QueuedLog {
    tx: mpsc::Sender<Job>,
    timeout: Duration,
    backend_name: String,
}

impl QueuedLog {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(backend: Arc<dyn InteractionLog>, capacity: usize, timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let backend_name = backend.name().to_string();

        // Exits once every sender is dropped and the queue is drained
        tokio::spawn(async move {
            while let Some((entry, ack)) = rx.recv().await {
                let result = backend.record(&entry).await;
                if let Err(e) = &result {
                    tracing::warn!(backend = backend.name(), error = %e, "Log append failed");
                }
                // The caller may have timed out already
                let _ = ack.send(result);
            }
            tracing::debug!(backend = backend.name(), "Log writer stopped");
        });

        Self {
            tx,
            timeout,
            backend_name,
        }
    }

    /// Pending rows not yet taken by the writer
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

#[async_trait]
impl InteractionLog for QueuedLog {
    async fn record(&self, entry: &LogEntry) -> Result<(), LogError> {
        let submit = async {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.tx
                .send((entry.clone(), ack_tx))
                .await
                .map_err(|_| LogError::Closed)?;
            ack_rx.await.map_err(|_| LogError::Closed)?
        };

        tokio::time::timeout(self.timeout, submit)
            .await
            .map_err(|_| LogError::Timeout(self.timeout))?
    }

    fn name(&self) -> &str {
        &self.backend_name
    }
}
