//! Voice processing: download, transcription and quality gating

use std::sync::Arc;
use std::time::{Duration, Instant};

use site_inspector_config::Settings;
use site_inspector_core::{
    AudioFetcher, AudioPayload, AudioRef, RetryPolicy, SpeechToText, Transcript,
    TranscriptionError,
};

/// Voice processor configuration
#[derive(Debug, Clone)]
pub struct VoiceProcessorConfig {
    /// Language hint used when the caller gives none
    pub language: String,
    /// Transcripts below this confidence are unintelligible
    pub min_confidence: f32,
    /// Bounded wait per transcription attempt
    pub timeout: Duration,
    /// Bounded wait for the audio download
    pub download_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for VoiceProcessorConfig {
    fn default() -> Self {
        Self {
            language: "ru".to_string(),
            min_confidence: 0.35,
            timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

impl VoiceProcessorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            language: settings.speech.language.clone(),
            min_confidence: settings.speech.min_confidence,
            timeout: settings.timeouts.transcription(),
            download_timeout: settings.timeouts.download(),
            retry: settings.retry.policy(),
        }
    }
}

/// Wraps a speech engine with timeouts, retry and an intelligibility check.
///
/// An engine error is never turned into empty text, and an empty or
/// low-confidence transcript is reported as `Unintelligible` rather than
/// passed downstream.
pub struct VoiceProcessor {
    stt: Arc<dyn SpeechToText>,
    config: VoiceProcessorConfig,
}

impl VoiceProcessor {
    pub fn new(stt: Arc<dyn SpeechToText>, config: VoiceProcessorConfig) -> Self {
        Self { stt, config }
    }

    pub fn model_name(&self) -> &str {
        self.stt.model_name()
    }

    /// Fetch announced audio from the transport
    pub async fn download(
        &self,
        fetcher: &dyn AudioFetcher,
        audio: &AudioRef,
    ) -> Result<AudioPayload, TranscriptionError> {
        let wait = self.config.download_timeout;
        let payload = self
            .config
            .retry
            .run("audio_download", |_| async move {
                match tokio::time::timeout(wait, fetcher.fetch(audio)).await {
                    Ok(result) => result,
                    Err(_) => Err(TranscriptionError::Timeout(wait)),
                }
            })
            .await?;

        if payload.is_empty() {
            return Err(TranscriptionError::AudioUnavailable(format!(
                "file {} is empty",
                audio.file_id
            )));
        }

        tracing::debug!(
            file_id = %audio.file_id,
            bytes = payload.len(),
            format = %payload.format,
            "Audio downloaded"
        );
        Ok(payload)
    }

    /// Transcribe audio into text
    pub async fn transcribe(
        &self,
        audio: &AudioPayload,
        language_hint: Option<&str>,
    ) -> Result<Transcript, TranscriptionError> {
        let language = language_hint.unwrap_or(self.config.language.as_str());
        let wait = self.config.timeout;
        let stt = &self.stt;
        let start = Instant::now();

        let transcript = self
            .config
            .retry
            .run("transcription", |_| async move {
                match tokio::time::timeout(wait, stt.transcribe(audio, language)).await {
                    Ok(result) => result,
                    Err(_) => Err(TranscriptionError::Timeout(wait)),
                }
            })
            .await?;

        if transcript.is_blank() {
            tracing::info!(
                model = self.stt.model_name(),
                "Transcription returned no text"
            );
            return Err(TranscriptionError::Unintelligible { confidence: 0.0 });
        }

        if transcript.confidence < self.config.min_confidence {
            tracing::info!(
                confidence = transcript.confidence,
                min_confidence = self.config.min_confidence,
                "Transcription below confidence floor"
            );
            return Err(TranscriptionError::Unintelligible {
                confidence: transcript.confidence,
            });
        }

        tracing::info!(
            model = self.stt.model_name(),
            chars = transcript.text.chars().count(),
            confidence = transcript.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Voice transcribed"
        );

        Ok(Transcript {
            text: transcript.text.trim().to_string(),
            ..transcript
        })
    }
}
