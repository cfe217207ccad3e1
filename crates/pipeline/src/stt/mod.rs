//! Speech-to-text backends

mod whisper;

pub use whisper::{WhisperConfig, WhisperStt};
