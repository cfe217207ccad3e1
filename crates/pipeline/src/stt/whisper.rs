//! Whisper STT backend - OpenAI-compatible `/audio/transcriptions`
//!
//! Sends the whole payload as a multipart upload and asks for
//! `verbose_json`, whose per-segment statistics give a confidence score:
//! the mean of `exp(avg_logprob) * (1 - no_speech_prob)` over segments.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use site_inspector_config::Settings;
use site_inspector_core::{AudioFormat, AudioPayload, SpeechToText, Transcript, TranscriptionError};

use crate::PipelineError;

/// Whisper backend configuration
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// API base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl WhisperConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            endpoint: settings.speech.endpoint.clone(),
            api_key: settings.speech.api_key.clone(),
            model: settings.speech.model.clone(),
            timeout: settings.timeouts.transcription(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    avg_logprob: f32,
    #[serde(default)]
    no_speech_prob: f32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Whisper transcription client
#[derive(Clone)]
pub struct WhisperStt {
    client: Client,
    config: WhisperConfig,
}

impl WhisperStt {
    pub fn new(config: WhisperConfig) -> Result<Self, PipelineError> {
        if config.api_key.is_empty() && !is_local(&config.endpoint) {
            return Err(PipelineError::Configuration(
                "API key required for remote transcription endpoint".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn transcriptions_url(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    /// Name and MIME type the engine accepts for this container.
    ///
    /// Telegram voice notes arrive as `.oga`; the API only recognises the
    /// `.ogg` extension for the same Ogg/Opus stream.
    fn upload_label(format: AudioFormat) -> Result<(String, &'static str), PipelineError> {
        match format {
            AudioFormat::Unknown => Err(PipelineError::Configuration(
                "cannot label audio with unknown container".to_string(),
            )),
            other => Ok((format!("voice.{}", other.file_extension()), other.mime_type())),
        }
    }

    async fn request(&self, audio: &AudioPayload, language: &str) -> Result<Transcript, PipelineError> {
        let (file_name, mime) = Self::upload_label(audio.format)?;
        let part = Part::bytes(audio.bytes.to_vec())
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json")
            .text("temperature", "0");

        let mut request = self.client.post(self.transcriptions_url()).multipart(form);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let raw = response.bytes().await?;
        let body: VerboseTranscription = serde_json::from_slice(&raw)
            .map_err(|e| PipelineError::InvalidResponse(e.to_string()))?;

        let confidence = segment_confidence(&body.segments, &body.text);
        Ok(Transcript {
            language: body.language,
            ..Transcript::new(body.text, confidence)
        })
    }
}

fn is_local(endpoint: &str) -> bool {
    endpoint.contains("localhost") || endpoint.contains("127.0.0.1")
}

/// Mean segment confidence; text without segments counts as fully confident
fn segment_confidence(segments: &[Segment], text: &str) -> f32 {
    if segments.is_empty() {
        return if text.trim().is_empty() { 0.0 } else { 1.0 };
    }
    let total: f32 = segments
        .iter()
        .map(|s| s.avg_logprob.exp().min(1.0) * (1.0 - s.no_speech_prob.clamp(0.0, 1.0)))
        .sum();
    total / segments.len() as f32
}

/// 429 with `insufficient_quota` is a hard quota failure, other 429s are
/// rate limits and may be retried. 5xx is retryable, other 4xx is not.
fn classify_failure(status: StatusCode, body: &str) -> PipelineError {
    let detail = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        let quota = detail
            .as_ref()
            .map(|d| {
                d.code.as_deref() == Some("insufficient_quota")
                    || d.kind.as_deref() == Some("insufficient_quota")
            })
            .unwrap_or(false);
        return if quota {
            PipelineError::Quota(message)
        } else {
            PipelineError::RateLimited(message)
        };
    }

    if status == StatusCode::PAYMENT_REQUIRED {
        return PipelineError::Quota(message);
    }

    PipelineError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl SpeechToText for WhisperStt {
    async fn transcribe(
        &self,
        audio: &AudioPayload,
        language_hint: &str,
    ) -> Result<Transcript, TranscriptionError> {
        tracing::debug!(
            bytes = audio.len(),
            format = %audio.format,
            language = language_hint,
            "Sending audio to Whisper"
        );
        self.request(audio, language_hint)
            .await
            .map_err(TranscriptionError::from)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use httpmock::prelude::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn stt(server: &MockServer) -> WhisperStt {
        WhisperStt::new(WhisperConfig {
            endpoint: server.base_url(),
            api_key: "test-key".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn ogg() -> AudioPayload {
        AudioPayload::new(AudioFormat::OggOpus, Bytes::from_static(b"OggS\x00\x02voice"))
    }

    #[test]
    fn test_requires_api_key_for_remote() {
        assert!(WhisperStt::new(WhisperConfig::default()).is_err());
        assert!(WhisperStt::new(WhisperConfig {
            endpoint: "http://localhost:9000/v1".into(),
            ..Default::default()
        })
        .is_ok());
    }

    #[test]
    fn test_upload_label_relabels_ogg() {
        let (name, mime) = WhisperStt::upload_label(AudioFormat::OggOpus).unwrap();
        assert_eq!(name, "voice.ogg");
        assert_eq!(mime, "audio/ogg");
        assert!(WhisperStt::upload_label(AudioFormat::Unknown).is_err());
    }

    #[test]
    fn test_segment_confidence() {
        let segments = vec![
            Segment { avg_logprob: 0.0, no_speech_prob: 0.0 },
            Segment { avg_logprob: 0.0, no_speech_prob: 1.0 },
        ];
        assert!((segment_confidence(&segments, "x") - 0.5).abs() < 1e-6);
        assert_eq!(segment_confidence(&[], "текст"), 1.0);
        assert_eq!(segment_confidence(&[], "  "), 0.0);
    }

    #[tokio::test]
    async fn test_transcribe_verbose_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/audio/transcriptions")
                .header("authorization", "Bearer test-key")
                .body_includes("whisper-1")
                .body_includes("voice.ogg");
            then.status(200).json_body(json!({
                "text": "трещина в несущей стене",
                "language": "russian",
                "segments": [{ "avg_logprob": -0.1, "no_speech_prob": 0.01 }]
            }));
        });

        let transcript = stt(&server).transcribe(&ogg(), "ru").await.unwrap();
        mock.assert_calls(1);
        assert_eq!(transcript.text, "трещина в несущей стене");
        assert!(transcript.confidence > 0.85);
        assert_eq!(transcript.language.as_deref(), Some("russian"));
    }

    #[tokio::test]
    async fn test_insufficient_quota_maps_to_quota_exceeded() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/audio/transcriptions");
            then.status(429).json_body(json!({
                "error": { "message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota" }
            }));
        });

        let err = stt(&server).transcribe(&ogg(), "ru").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/audio/transcriptions");
            then.status(429).json_body(json!({
                "error": { "message": "Rate limit reached", "type": "requests" }
            }));
        });

        let err = stt(&server).transcribe(&ogg(), "ru").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_network() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/audio/transcriptions");
            then.status(503).body("upstream down");
        });

        let err = stt(&server).transcribe(&ogg(), "ru").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Network(_)));
    }

    #[tokio::test]
    async fn test_bad_request_is_upstream() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/audio/transcriptions");
            then.status(400).json_body(json!({
                "error": { "message": "Invalid file format." }
            }));
        });

        let err = stt(&server).transcribe(&ogg(), "ru").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Upstream(ref m) if m.contains("Invalid file format")));
    }

    #[tokio::test]
    async fn test_garbage_body_is_upstream() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/audio/transcriptions");
            then.status(200).body("not json");
        });

        let err = stt(&server).transcribe(&ogg(), "ru").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_body_stalled_mid_read_is_network() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 8192];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n{\"text\":",
                        )
                        .await;
                    tokio::time::sleep(Duration::from_secs(10)).await;
                });
            }
        });

        let stt = WhisperStt::new(WhisperConfig {
            endpoint,
            api_key: "test-key".into(),
            timeout: Duration::from_millis(300),
            ..Default::default()
        })
        .unwrap();

        let err = stt.transcribe(&ogg(), "ru").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Network(_)), "unexpected error: {:?}", err);
        assert!(err.is_transient());
    }
}
