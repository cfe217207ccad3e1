//! Speech-to-text output

use serde::{Deserialize, Serialize};

/// Transcription returned by a speech engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Engine confidence in [0, 1]; 1.0 when the engine reports none
    pub confidence: f32,
    /// Language detected by the engine, if reported
    #[serde(default)]
    pub language: Option<String>,
}

impl Transcript {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            language: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
