//! Violation reports as received from the bot transport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::audio::AudioMeta;

/// Opaque sender identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation the reply goes back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to audio held by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRef {
    /// Transport-specific handle used to download the bytes
    pub file_id: String,
    pub meta: AudioMeta,
}

/// What the user actually sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawInput {
    Text(String),
    Voice(AudioRef),
}

impl RawInput {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Text(_) => InputKind::Text,
            Self::Voice(_) => InputKind::Voice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Voice,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound report, alive for a single pipeline run.
///
/// Fields are private so the transcription can be attached exactly once;
/// after that the report is read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    id: Uuid,
    raw_input: RawInput,
    transcribed_text: Option<String>,
    timestamp: DateTime<Utc>,
    user_id: UserId,
    chat_id: ChatId,
}

impl ViolationReport {
    pub fn new(raw_input: RawInput, user_id: UserId, chat_id: ChatId) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_input,
            transcribed_text: None,
            timestamp: Utc::now(),
            user_id,
            chat_id,
        }
    }

    /// Override the receive time (transport-provided message date)
    pub fn received_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the transcription. Text reports ignore it.
    pub fn with_transcription(mut self, text: impl Into<String>) -> Self {
        if matches!(self.raw_input, RawInput::Voice(_)) && self.transcribed_text.is_none() {
            self.transcribed_text = Some(text.into());
        }
        self
    }

    /// Replace the text payload with its normalized form
    pub fn with_normalized_text(mut self, text: impl Into<String>) -> Self {
        if let RawInput::Text(_) = self.raw_input {
            self.raw_input = RawInput::Text(text.into());
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn raw_input(&self) -> &RawInput {
        &self.raw_input
    }

    pub fn transcribed_text(&self) -> Option<&str> {
        self.transcribed_text.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn input_kind(&self) -> InputKind {
        self.raw_input.kind()
    }

    /// Text fed to retrieval and analysis; `None` until a voice report is transcribed
    pub fn description(&self) -> Option<&str> {
        match &self.raw_input {
            RawInput::Text(text) => Some(text.as_str()),
            RawInput::Voice(_) => self.transcribed_text.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use std::time::Duration;

    fn voice() -> RawInput {
        RawInput::Voice(AudioRef {
            file_id: "file-1".into(),
            meta: AudioMeta::new(AudioFormat::OggOpus, Duration::from_secs(5)),
        })
    }

    #[test]
    fn test_text_report_description() {
        let report = ViolationReport::new(RawInput::Text("трещина".into()), UserId(1), ChatId(1));
        assert_eq!(report.description(), Some("трещина"));
        assert_eq!(report.input_kind(), InputKind::Text);

        let report = report.with_transcription("ignored");
        assert_eq!(report.transcribed_text(), None);
    }

    #[test]
    fn test_voice_transcription_attached_once() {
        let report = ViolationReport::new(voice(), UserId(7), ChatId(7));
        assert_eq!(report.description(), None);

        let report = report.with_transcription("первый").with_transcription("второй");
        assert_eq!(report.description(), Some("первый"));
        assert_eq!(report.input_kind(), InputKind::Voice);
    }
}
