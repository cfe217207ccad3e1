//! Persistence errors

use std::time::Duration;
use thiserror::Error;

use site_inspector_core::LogError;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Log writer closed")]
    Closed,
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        PersistenceError::Network(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for PersistenceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        PersistenceError::Credentials(err.to_string())
    }
}

/// A client error other than auth or throttling means the row itself was
/// refused; everything else is the backend being unavailable.
impl From<PersistenceError> for LogError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Http { status, .. }
                if (400..500).contains(&status) && !matches!(status, 401 | 403 | 408 | 429) =>
            {
                LogError::Rejected(err.to_string())
            },
            PersistenceError::Serialization(_) => LogError::Rejected(err.to_string()),
            PersistenceError::Timeout(d) => LogError::Timeout(d),
            PersistenceError::Closed => LogError::Closed,
            other => LogError::Unavailable(other.to_string()),
        }
    }
}
