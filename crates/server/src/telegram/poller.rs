//! Long-poll loop over `getUpdates`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::client::TelegramBot;
use super::updates::parse_update;
use super::TelegramError;
use crate::dispatcher::Dispatcher;
use crate::metrics;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct Poller {
    bot: Arc<TelegramBot>,
    dispatcher: Dispatcher,
    offset: i64,
}

impl Poller {
    pub fn new(bot: Arc<TelegramBot>, dispatcher: Dispatcher) -> Self {
        Self {
            bot,
            dispatcher,
            offset: 0,
        }
    }

    /// Next `update_id` to request
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Poll until `shutdown` flips to `true`
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Telegram polling started");
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(_) => backoff = INITIAL_BACKOFF,
                Err(e) => {
                    let wait = match &e {
                        TelegramError::Api {
                            retry_after: Some(secs),
                            ..
                        } => Duration::from_secs(*secs),
                        _ => backoff,
                    };
                    if matches!(e, TelegramError::Api { code: 409, .. }) {
                        tracing::error!(error = %e, "Another consumer holds the update stream");
                    } else {
                        tracing::warn!(error = %e, retry_in_ms = wait.as_millis() as u64, "getUpdates failed");
                    }
                    metrics::record_poll_error();
                    backoff = (backoff * 2).min(MAX_BACKOFF);

                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(wait) => {},
                    }
                },
            }
        }

        tracing::info!(offset = self.offset, "Telegram polling stopped");
    }

    /// Fetch one batch and dispatch it. Returns the number of updates seen.
    pub async fn poll_once(&mut self) -> Result<usize, TelegramError> {
        let updates = self.bot.get_updates(self.offset).await?;
        let count = updates.len();

        for update in updates {
            // Acknowledge even updates we ignore
            self.offset = self.offset.max(update.update_id + 1);

            let Some(parsed) = parse_update(update) else {
                metrics::record_update("ignored");
                continue;
            };
            metrics::record_update(parsed.event.kind.name());

            if let Some(callback_id) = parsed.callback_id {
                let bot = Arc::clone(&self.bot);
                tokio::spawn(async move {
                    if let Err(e) = bot.answer_callback_query(&callback_id).await {
                        tracing::debug!(error = %e, "Callback answer failed");
                    }
                });
            }

            self.dispatcher.dispatch(parsed.event);
        }

        Ok(count)
    }
}
