//! Fake collaborators shared by the server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use site_inspector_agent::{HandlerComponents, HandlerConfig, MessageHandler};
use site_inspector_core::{
    AnalysisError, AnalysisResult, AudioPayload, ChatId, DeliveryError, MessageRef,
    OutboundMessage, ReplyChannel, RetrievalError, RetrievedDocument, Retriever, RetryPolicy,
    Severity, SourceReference, SpeechToText, Transcript, TranscriptionError, TracingOps,
    ViolationAnalyzer,
};
use site_inspector_persistence::InMemoryLog;
use site_inspector_pipeline::{Validator, VoiceProcessor, VoiceProcessorConfig};

/// Reports containing this marker block in retrieval until released
pub const SLOW_MARKER: &str = "медленно";

#[derive(Default)]
pub struct FakeReplies {
    pub sent: Mutex<Vec<(ChatId, OutboundMessage)>>,
    next_id: AtomicUsize,
}

impl FakeReplies {
    /// Final HTML replies, i.e. analysis results, per chat
    pub fn analyses(&self) -> Vec<(ChatId, String)> {
        self.sent
            .lock()
            .iter()
            .filter(|(_, m)| m.html && m.text.contains("Серьёзность"))
            .map(|(c, m)| (*c, m.text.clone()))
            .collect()
    }
}

#[async_trait]
impl ReplyChannel for FakeReplies {
    async fn send(
        &self,
        chat_id: ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageRef, DeliveryError> {
        self.sent.lock().push((chat_id, message.clone()));
        Ok(MessageRef {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1,
        })
    }

    async fn edit(&self, _message: &MessageRef, _text: &str) -> Result<(), DeliveryError> {
        Ok(())
    }

    async fn delete(&self, _message: &MessageRef) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Retriever that parks slow queries until `release` is notified
#[derive(Default)]
pub struct GatedRetriever {
    pub entered: Notify,
    pub release: Notify,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Retriever for GatedRetriever {
    async fn retrieve(
        &self,
        query: &str,
        _top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query.contains(SLOW_MARKER) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(vec![RetrievedDocument {
            document_id: "sp12-6.2.4".into(),
            excerpt_text: "Ограждения мест производства работ должны быть установлены до начала работ."
                .into(),
            source: SourceReference::new(
                "Безопасность труда в строительстве",
                "СНиП 12-03-2001",
                "6.2.4",
            ),
            relevance_score: 0.88,
        }])
    }
}

pub struct FixedAnalyzer;

#[async_trait]
impl ViolationAnalyzer for FixedAnalyzer {
    async fn analyze(
        &self,
        description: &str,
        context: &[RetrievedDocument],
    ) -> Result<AnalysisResult, AnalysisError> {
        Ok(AnalysisResult {
            classification: "safety hazard".into(),
            severity: Severity::Medium,
            cited_references: context.iter().map(|d| d.source.clone()).collect(),
            recommendation_text: "Установить ограждение".into(),
            corrected_description: Some(description.to_string()),
        })
    }

    fn model_name(&self) -> &str {
        "test-model"
    }
}

pub struct SilentStt;

#[async_trait]
impl SpeechToText for SilentStt {
    async fn transcribe(
        &self,
        _audio: &AudioPayload,
        _language_hint: &str,
    ) -> Result<Transcript, TranscriptionError> {
        Err(TranscriptionError::Upstream("not used".into()))
    }

    fn model_name(&self) -> &str {
        "none"
    }
}

pub struct NoAudio;

#[async_trait]
impl site_inspector_core::AudioFetcher for NoAudio {
    async fn fetch(
        &self,
        audio: &site_inspector_core::AudioRef,
    ) -> Result<AudioPayload, TranscriptionError> {
        Err(TranscriptionError::AudioUnavailable(audio.file_id.clone()))
    }
}

pub struct Harness {
    pub handler: Arc<MessageHandler>,
    pub replies: Arc<FakeReplies>,
    pub retriever: Arc<GatedRetriever>,
    pub log: Arc<InMemoryLog>,
}

pub fn harness() -> Harness {
    harness_with_log(Arc::new(InMemoryLog::new()))
}

pub fn harness_with_log(log: Arc<InMemoryLog>) -> Harness {
    let replies = Arc::new(FakeReplies::default());
    let retriever = Arc::new(GatedRetriever::default());

    let voice = VoiceProcessor::new(
        Arc::new(SilentStt),
        VoiceProcessorConfig {
            retry: RetryPolicy::none(),
            ..Default::default()
        },
    );
    let handler = MessageHandler::new(
        HandlerComponents {
            validator: Validator::default(),
            voice,
            fetcher: Arc::new(NoAudio),
            retriever: retriever.clone(),
            analyzer: Arc::new(FixedAnalyzer),
            log: log.clone(),
            replies: replies.clone(),
            ops: Arc::new(TracingOps),
        },
        HandlerConfig {
            retry: RetryPolicy::none(),
            ..Default::default()
        },
    );

    Harness {
        handler: Arc::new(handler),
        replies,
        retriever,
        log,
    }
}
