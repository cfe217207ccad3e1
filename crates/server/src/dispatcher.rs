//! Event dispatcher
//!
//! Runs every inbound event on its own task. A newer event from the same
//! chat supersedes the one in flight: the older task is aborted, its
//! pending external calls are dropped and it sends nothing further.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::{AbortHandle, JoinHandle};

use site_inspector_agent::{InboundEvent, MessageHandler, RunOutcome};
use site_inspector_core::ChatId;

use crate::metrics;

struct InFlight {
    run_id: u64,
    abort: AbortHandle,
}

#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<MessageHandler>,
    in_flight: Arc<DashMap<ChatId, InFlight>>,
    next_run: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(handler: Arc<MessageHandler>) -> Self {
        Self {
            handler,
            in_flight: Arc::new(DashMap::new()),
            next_run: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Spawn the event and register it as the chat's current run.
    ///
    /// The returned handle resolves to a cancelled `JoinError` when the run
    /// is superseded.
    pub fn dispatch(&self, event: InboundEvent) -> JoinHandle<RunOutcome> {
        let chat_id = event.chat_id;
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let handler = Arc::clone(&self.handler);
        let in_flight = Arc::clone(&self.in_flight);

        // The task starts only after it is registered, so its own cleanup
        // can never run before the insert below
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = registered_rx.await;
            let outcome = handler.handle(event).await;
            in_flight.remove_if(&chat_id, |_, run| run.run_id == run_id);
            outcome
        });

        let current = InFlight {
            run_id,
            abort: task.abort_handle(),
        };
        if let Some(previous) = self.in_flight.insert(chat_id, current) {
            if !previous.abort.is_finished() {
                previous.abort.abort();
                metrics::record_superseded();
                tracing::info!(
                    chat_id = %chat_id,
                    superseded_run = previous.run_id,
                    run_id,
                    "Superseded in-flight event"
                );
            }
        }
        let _ = registered_tx.send(());

        task
    }

    /// Chats with a run still in progress
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait up to `grace` for running events, then abort the rest
    pub async fn drain(&self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        while !self.in_flight.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let remaining = self.in_flight.len();
        if remaining > 0 {
            tracing::warn!(remaining, "Aborting events still running at shutdown");
            for entry in self.in_flight.iter() {
                entry.abort.abort();
            }
            self.in_flight.clear();
        }
    }
}
