//! Inbound report validation
//!
//! Pure checks on message shape. Nothing here performs I/O, so a rejected
//! report never reaches the transcription, retrieval or reasoning backends.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use site_inspector_config::Settings;
use site_inspector_core::{AudioFormat, AudioRef, RawInput, ValidationError};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Validation limits
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    pub min_text_chars: usize,
    pub max_text_chars: usize,
    pub min_voice_duration: Duration,
    pub max_voice_duration: Duration,
    pub max_audio_bytes: u64,
    pub accepted_formats: Vec<AudioFormat>,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_text_chars: 5,
            max_text_chars: 1000,
            min_voice_duration: Duration::from_secs(1),
            max_voice_duration: Duration::from_secs(60),
            max_audio_bytes: 20 * 1024 * 1024,
            accepted_formats: vec![
                AudioFormat::OggOpus,
                AudioFormat::Mp3,
                AudioFormat::Wav,
                AudioFormat::M4a,
                AudioFormat::Webm,
            ],
        }
    }
}

impl ValidationLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        let limits = &settings.limits;
        Self {
            min_text_chars: limits.min_text_chars,
            max_text_chars: limits.max_text_chars,
            min_voice_duration: Duration::from_secs(limits.min_voice_secs),
            max_voice_duration: Duration::from_secs(limits.max_voice_secs),
            max_audio_bytes: limits.max_audio_bytes,
            accepted_formats: limits.accepted_formats.clone(),
        }
    }
}

/// Input that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    /// Whitespace-collapsed text
    Text(String),
    Voice(AudioRef),
}

/// Collapse whitespace runs and straighten typographic quotes
pub fn normalize_text(text: &str) -> String {
    let straightened: String = text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect();
    WHITESPACE_RUN
        .replace_all(straightened.trim(), " ")
        .into_owned()
}

/// Report validator
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate a raw inbound report
    pub fn validate(&self, input: &RawInput) -> Result<NormalizedInput, ValidationError> {
        match input {
            RawInput::Text(text) => self.validate_text(text).map(NormalizedInput::Text),
            RawInput::Voice(audio) => {
                self.validate_audio(audio)?;
                Ok(NormalizedInput::Voice(audio.clone()))
            }
        }
    }

    /// Limits are counted in characters, not bytes
    pub fn validate_text(&self, text: &str) -> Result<String, ValidationError> {
        let normalized = normalize_text(text);
        let chars = normalized.chars().count();

        if chars == 0 {
            return Err(ValidationError::EmptyInput);
        }
        if chars < self.limits.min_text_chars {
            return Err(ValidationError::TooShort {
                actual: chars,
                min: self.limits.min_text_chars,
            });
        }
        if chars > self.limits.max_text_chars {
            return Err(ValidationError::TooLong {
                actual: chars,
                max: self.limits.max_text_chars,
            });
        }

        Ok(normalized)
    }

    /// Checks announced metadata only; the audio is not downloaded yet
    pub fn validate_audio(&self, audio: &AudioRef) -> Result<(), ValidationError> {
        let meta = &audio.meta;

        if !self.limits.accepted_formats.contains(&meta.format) {
            let label = meta
                .mime_type
                .clone()
                .unwrap_or_else(|| meta.format.to_string());
            return Err(ValidationError::UnsupportedFormat(label));
        }

        if meta.duration > self.limits.max_voice_duration {
            return Err(ValidationError::DurationExceeded {
                actual: meta.duration,
                max: self.limits.max_voice_duration,
            });
        }

        if meta.duration < self.limits.min_voice_duration {
            return Err(ValidationError::DurationTooShort {
                actual: meta.duration,
                min: self.limits.min_voice_duration,
            });
        }

        if let Some(size) = meta.size_bytes {
            if size > self.limits.max_audio_bytes {
                return Err(ValidationError::FileTooLarge {
                    actual: size,
                    max: self.limits.max_audio_bytes,
                });
            }
        }

        Ok(())
    }
}
