//! Speech processing traits

use async_trait::async_trait;

use crate::audio::AudioPayload;
use crate::error::TranscriptionError;
use crate::report::AudioRef;
use crate::transcript::Transcript;

/// Speech-to-Text interface
///
/// Implementations:
/// - `WhisperStt` - OpenAI-compatible `/audio/transcriptions`
///
/// Engines must not report failures as empty text; the voice processor
/// decides what counts as unintelligible from the returned confidence.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe a complete audio payload
    ///
    /// # Arguments
    /// * `audio` - Downloaded audio with its detected container
    /// * `language_hint` - ISO-639-1 code, e.g. `ru`
    async fn transcribe(
        &self,
        audio: &AudioPayload,
        language_hint: &str,
    ) -> Result<Transcript, TranscriptionError>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Downloads audio the transport announced by reference
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, audio: &AudioRef) -> Result<AudioPayload, TranscriptionError>;
}
