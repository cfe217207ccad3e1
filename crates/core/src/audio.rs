//! Audio payload types and container detection

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Audio containers the bot may receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// Ogg container with Opus audio (Telegram voice notes)
    OggOpus,
    Mp3,
    Wav,
    /// MPEG-4 audio (m4a / mp4)
    M4a,
    Webm,
    Flac,
    #[default]
    Unknown,
}

impl AudioFormat {
    /// Map a MIME type such as `audio/ogg; codecs=opus`
    pub fn from_mime(mime: &str) -> Self {
        let base = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "audio/ogg" | "audio/opus" | "application/ogg" => Self::OggOpus,
            "audio/mpeg" | "audio/mp3" => Self::Mp3,
            "audio/wav" | "audio/x-wav" | "audio/wave" => Self::Wav,
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Self::M4a,
            "audio/webm" => Self::Webm,
            "audio/flac" | "audio/x-flac" => Self::Flac,
            _ => Self::Unknown,
        }
    }

    /// Map a file name or bare extension
    pub fn from_extension(name: &str) -> Self {
        let ext = name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "ogg" | "oga" | "opus" => Self::OggOpus,
            "mp3" => Self::Mp3,
            "wav" => Self::Wav,
            "m4a" | "mp4" | "aac" => Self::M4a,
            "webm" => Self::Webm,
            "flac" => Self::Flac,
            _ => Self::Unknown,
        }
    }

    /// Sniff the container from leading magic bytes
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"OggS") {
            Self::OggOpus
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            Self::Wav
        } else if bytes.starts_with(b"ID3")
            || (bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0)
        {
            Self::Mp3
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            Self::M4a
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            Self::Webm
        } else if bytes.starts_with(b"fLaC") {
            Self::Flac
        } else {
            Self::Unknown
        }
    }

    /// File extension expected by transcription engines
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::OggOpus => "ogg",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
            Self::Webm => "webm",
            Self::Flac => "flac",
            Self::Unknown => "bin",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::OggOpus => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::M4a => "audio/mp4",
            Self::Webm => "audio/webm",
            Self::Flac => "audio/flac",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OggOpus => "ogg/opus",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
            Self::Webm => "webm",
            Self::Flac => "flac",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Metadata announced by the transport before the audio is downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMeta {
    pub format: AudioFormat,
    pub duration: Duration,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

impl AudioMeta {
    pub fn new(format: AudioFormat, duration: Duration) -> Self {
        Self {
            format,
            duration,
            mime_type: None,
            size_bytes: None,
        }
    }

    /// Build from transport fields, preferring the MIME type over the file name
    pub fn from_transport(
        mime_type: Option<&str>,
        file_name: Option<&str>,
        duration_secs: u64,
        size_bytes: Option<u64>,
    ) -> Self {
        let format = mime_type
            .map(AudioFormat::from_mime)
            .filter(AudioFormat::is_known)
            .or_else(|| file_name.map(AudioFormat::from_extension))
            .unwrap_or_default();
        Self {
            format,
            duration: Duration::from_secs(duration_secs),
            mime_type: mime_type.map(str::to_string),
            size_bytes,
        }
    }
}

/// Downloaded audio ready for transcription
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub format: AudioFormat,
    pub bytes: Bytes,
}

impl AudioPayload {
    /// Trust the sniffed container over the announced one when they disagree
    pub fn new(announced: AudioFormat, bytes: Bytes) -> Self {
        let sniffed = AudioFormat::detect(&bytes);
        let format = if sniffed.is_known() { sniffed } else { announced };
        Self { format, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
