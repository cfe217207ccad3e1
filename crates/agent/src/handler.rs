//! Message handler
//!
//! Drives one inbound event through validation, transcription, retrieval,
//! analysis and logging, then replies. Every stage failure ends the run
//! with an error reply and, once validation has passed, a `failed` log row.
//! Log failures go to the ops channel and never block the reply.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use site_inspector_config::Settings;
use site_inspector_core::{
    AudioFetcher, AudioRef, ChatId, Error, InteractionLog, LogEntry, LogError,
    MessageRef, OpsAlert, OpsChannel, OutboundMessage, PipelineStage, RawInput, ReplyChannel,
    RetrievalError, RetrievedDocument, Retriever, RetryPolicy, ViolationAnalyzer,
    ViolationReport,
};
use site_inspector_pipeline::{NormalizedInput, Validator, VoiceProcessor};

use crate::event::{CallbackAction, Command, EventKind, InboundEvent};
use crate::metrics;
use crate::reply;
use crate::state::{HandlerState, Run, RunOutcome};

/// Handler tunables
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Excerpts requested from retrieval
    pub top_k: usize,
    pub retrieval_timeout: Duration,
    pub log_timeout: Duration,
    /// Retry for transient retrieval failures
    pub retry: RetryPolicy,
    /// Shown in the welcome and help texts
    pub max_voice_secs: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            retrieval_timeout: Duration::from_secs(10),
            log_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            max_voice_secs: 60,
        }
    }
}

impl HandlerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_k: settings.rag.top_k,
            retrieval_timeout: settings.timeouts.retrieval(),
            log_timeout: settings.timeouts.log_append(),
            retry: settings.retry.policy(),
            max_voice_secs: settings.limits.max_voice_secs,
        }
    }
}

/// Collaborators of the handler
pub struct HandlerComponents {
    pub validator: Validator,
    pub voice: VoiceProcessor,
    pub fetcher: Arc<dyn AudioFetcher>,
    pub retriever: Arc<dyn Retriever>,
    pub analyzer: Arc<dyn ViolationAnalyzer>,
    pub log: Arc<dyn InteractionLog>,
    pub replies: Arc<dyn ReplyChannel>,
    pub ops: Arc<dyn OpsChannel>,
}

pub struct MessageHandler {
    components: HandlerComponents,
    config: HandlerConfig,
}

/// Time one stage and record its latency
async fn timed<T>(stage: PipelineStage, fut: impl Future<Output = T>) -> T {
    let start = Instant::now();
    let out = fut.await;
    metrics::record_stage_latency(stage, start.elapsed());
    out
}

impl MessageHandler {
    pub fn new(components: HandlerComponents, config: HandlerConfig) -> Self {
        Self { components, config }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Handle one event to a terminal state
    pub async fn handle(&self, event: InboundEvent) -> RunOutcome {
        let kind = event.kind.name();
        let start = Instant::now();

        let outcome = match event.kind.clone() {
            EventKind::Report(raw) => self.handle_report(&event, raw).await,
            EventKind::Command(command) => self.handle_command(event.chat_id, command).await,
            EventKind::Callback(action) => self.handle_callback(event.chat_id, action).await,
            EventKind::Unsupported => {
                self.reply_only(event.chat_id, reply::with_keyboard(reply::UNSUPPORTED_HINT))
                    .await
            },
        };

        let label = match outcome.failure() {
            Some((stage, _)) => format!("failed_{}", stage),
            None => "replied".to_string(),
        };
        metrics::record_event(kind, label);
        metrics::record_run_latency(kind, start.elapsed());
        outcome
    }

    async fn handle_command(&self, chat_id: ChatId, command: Command) -> RunOutcome {
        let message = match command {
            Command::Start => reply::welcome(self.config.max_voice_secs),
            Command::Help => reply::help(self.config.max_voice_secs),
        };
        self.reply_only(chat_id, message).await
    }

    async fn handle_callback(&self, chat_id: ChatId, action: CallbackAction) -> RunOutcome {
        let message = match action {
            CallbackAction::NewViolation => reply::recording_instructions(self.config.max_voice_secs),
        };
        self.reply_only(chat_id, message).await
    }

    /// Events that are answered without running the pipeline
    async fn reply_only(&self, chat_id: ChatId, message: OutboundMessage) -> RunOutcome {
        let run = Run::new();
        match self.components.replies.send(chat_id, &message).await {
            Ok(_) => run.replied(),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Reply delivery failed");
                run.fail(PipelineStage::Reply, e.into())
            },
        }
    }

    async fn handle_report(&self, event: &InboundEvent, raw: RawInput) -> RunOutcome {
        let mut run = Run::new();
        let chat_id = event.chat_id;
        let report =
            ViolationReport::new(raw, event.user_id, chat_id).received_at(event.received_at);

        tracing::info!(
            report_id = %report.id(),
            user_id = %report.user_id(),
            chat_id = %chat_id,
            kind = %report.input_kind(),
            "Violation report received"
        );

        // Rejected reports are not pipeline runs: no log row, no external call
        let normalized = match self.components.validator.validate(report.raw_input()) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::info!(report_id = %report.id(), reason = %e, "Report rejected");
                let error = Error::from(e);
                self.send_quietly(chat_id, &reply::error_reply(&error)).await;
                return run.fail(PipelineStage::Validation, error);
            },
        };
        run.advance(HandlerState::Validated);

        let progress_text = match &normalized {
            NormalizedInput::Voice(_) => reply::PROGRESS_VOICE,
            NormalizedInput::Text(_) => reply::PROGRESS_ANALYZING,
        };
        let progress = self
            .components
            .replies
            .send(chat_id, &OutboundMessage::plain(progress_text))
            .await
            .map_err(|e| tracing::warn!(error = %e, "Progress message not delivered"))
            .ok();

        let report = match normalized {
            NormalizedInput::Text(text) => report.with_normalized_text(text),
            NormalizedInput::Voice(audio) => {
                match timed(PipelineStage::Transcription, self.transcribe(&audio)).await {
                    Ok(text) => {
                        run.advance(HandlerState::Transcribed);
                        if let Some(progress) = &progress {
                            self.edit_quietly(progress, reply::PROGRESS_ANALYZING).await;
                        }
                        report.with_transcription(text)
                    },
                    Err(error) => {
                        return self
                            .fail(run, &report, progress, PipelineStage::Transcription, error, vec![])
                            .await;
                    },
                }
            },
        };
        let description = report.description().unwrap_or_default().to_string();

        let retrieved = match timed(PipelineStage::Retrieval, self.retrieve(&description)).await {
            Ok(documents) => documents,
            Err(e) => {
                return self
                    .fail(run, &report, progress, PipelineStage::Retrieval, e.into(), vec![])
                    .await;
            },
        };
        run.advance(HandlerState::Retrieved);

        let analysis = match timed(
            PipelineStage::Analysis,
            self.components.analyzer.analyze(&description, &retrieved),
        )
        .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                return self
                    .fail(run, &report, progress, PipelineStage::Analysis, e.into(), retrieved)
                    .await;
            },
        };
        run.advance(HandlerState::Analyzed);
        run.set_analysis(analysis.clone());

        let entry = LogEntry::success(
            &report,
            retrieved,
            analysis.clone(),
            self.components.analyzer.model_name(),
        );
        let log_alert = self.record(&entry).await;
        run.advance(HandlerState::Logged);

        if let Some(progress) = &progress {
            self.delete_quietly(progress).await;
        }

        let message = reply::analysis_reply(&description, &analysis);
        let outcome = match self.components.replies.send(chat_id, &message).await {
            Ok(_) => {
                tracing::info!(
                    report_id = %report.id(),
                    classification = %analysis.classification,
                    severity = %analysis.severity,
                    "Report answered"
                );
                run.replied()
            },
            Err(e) => {
                tracing::warn!(report_id = %report.id(), error = %e, "Analysis reply not delivered");
                // The row already says `success`; ops is the only record of the lost reply
                self.components
                    .ops
                    .alert(&OpsAlert::new(
                        "reply",
                        format!(
                            "analysis reply for report {} (user {}) not delivered after a success row was logged: {}",
                            report.id(),
                            report.user_id(),
                            e
                        ),
                    ))
                    .await;
                run.fail(PipelineStage::Reply, e.into())
            },
        };
        self.alert_ops(log_alert).await;
        outcome
    }

    /// Download, transcribe and re-check the transcript length
    async fn transcribe(&self, audio: &AudioRef) -> Result<String, Error> {
        let voice = &self.components.voice;
        let payload = voice
            .download(self.components.fetcher.as_ref(), audio)
            .await?;
        let transcript = voice.transcribe(&payload, None).await?;
        let text = self.components.validator.validate_text(&transcript.text)?;
        Ok(text)
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let wait = self.config.retrieval_timeout;
        let retriever = &self.components.retriever;
        let top_k = self.config.top_k;

        self.config
            .retry
            .run("retrieval", |_| async move {
                match tokio::time::timeout(wait, retriever.retrieve(query, top_k)).await {
                    Ok(result) => result,
                    Err(_) => Err(RetrievalError::Timeout(wait)),
                }
            })
            .await
    }

    /// Append a row with a bounded wait. A failure comes back as the ops
    /// alert to raise once the user has been answered.
    async fn record(&self, entry: &LogEntry) -> Option<OpsAlert> {
        let log = &self.components.log;
        let wait = self.config.log_timeout;

        let result = timed(PipelineStage::Logging, async {
            match tokio::time::timeout(wait, log.record(entry)).await {
                Ok(result) => result,
                Err(_) => Err(LogError::Timeout(wait)),
            }
        })
        .await;

        let e = result.err()?;
        tracing::warn!(backend = log.name(), error = %e, status = %entry.status, "Log append failed");
        metrics::record_log_failure(log.name().to_string());
        Some(OpsAlert::new(
            "interaction_log",
            format!("{} append failed for user {}: {}", log.name(), entry.user_id, e),
        ))
    }

    async fn alert_ops(&self, alert: Option<OpsAlert>) {
        if let Some(alert) = alert {
            self.components.ops.alert(&alert).await;
        }
    }

    /// Failure after validation: one `failed` row, then the error reply
    async fn fail(
        &self,
        run: Run,
        report: &ViolationReport,
        progress: Option<MessageRef>,
        stage: PipelineStage,
        error: Error,
        retrieved: Vec<RetrievedDocument>,
    ) -> RunOutcome {
        tracing::warn!(
            report_id = %report.id(),
            stage = %stage,
            error = %error,
            "Pipeline run failed"
        );

        let entry = LogEntry::failure(
            report,
            retrieved,
            stage,
            error.to_string(),
            self.components.analyzer.model_name(),
        );
        let log_alert = self.record(&entry).await;

        if let Some(progress) = &progress {
            self.delete_quietly(progress).await;
        }
        self.send_quietly(report.chat_id(), &reply::error_reply(&error))
            .await;
        self.alert_ops(log_alert).await;
        run.fail(stage, error)
    }

    async fn send_quietly(&self, chat_id: ChatId, message: &OutboundMessage) {
        if let Err(e) = self.components.replies.send(chat_id, message).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Reply delivery failed");
        }
    }

    async fn edit_quietly(&self, message: &MessageRef, text: &str) {
        if let Err(e) = self.components.replies.edit(message, text).await {
            tracing::debug!(error = %e, "Progress edit failed");
        }
    }

    async fn delete_quietly(&self, message: &MessageRef) {
        if let Err(e) = self.components.replies.delete(message).await {
            tracing::debug!(error = %e, "Progress delete failed");
        }
    }
}
