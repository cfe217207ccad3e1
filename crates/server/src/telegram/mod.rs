//! Telegram transport
//!
//! Bot API client, update parsing, long-poll loop and the admin-chat
//! operational channel.

pub mod client;
pub mod poller;
pub mod types;
pub mod updates;

pub use client::{BotApiConfig, TelegramBot};
pub use poller::Poller;
pub use updates::{parse_update, ParsedUpdate};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use site_inspector_core::{
    ChatId, DeliveryError, OpsAlert, OpsChannel, OutboundMessage, TracingOps, TranscriptionError,
};

/// Bot API errors
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Bot API error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        retry_after: Option<u64>,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TelegramError {
    /// Worth another attempt: transport trouble, rate limits, server errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            Self::Decode(_) | Self::Configuration(_) => false,
        }
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the bot token and must not reach the logs
        let err = err.without_url();
        if err.is_timeout() {
            TelegramError::Timeout
        } else if err.is_decode() {
            TelegramError::Decode(err.to_string())
        } else {
            TelegramError::Network(err.to_string())
        }
    }
}

impl From<TelegramError> for DeliveryError {
    fn from(err: TelegramError) -> Self {
        if err.is_transient() {
            return DeliveryError::Network(err.to_string());
        }
        match err {
            TelegramError::Api { description, .. } => DeliveryError::Rejected(description),
            other => DeliveryError::Network(other.to_string()),
        }
    }
}

impl From<TelegramError> for TranscriptionError {
    fn from(err: TelegramError) -> Self {
        TranscriptionError::AudioUnavailable(err.to_string())
    }
}

/// Ops channel that logs every alert and also posts it to the admin chat
pub struct TelegramOps {
    bot: Arc<TelegramBot>,
    admin_chat: Option<ChatId>,
}

impl TelegramOps {
    pub fn new(bot: Arc<TelegramBot>, admin_chat: Option<ChatId>) -> Self {
        Self { bot, admin_chat }
    }
}

#[async_trait]
impl OpsChannel for TelegramOps {
    async fn alert(&self, alert: &OpsAlert) {
        TracingOps.alert(alert).await;

        let Some(chat_id) = self.admin_chat else {
            return;
        };
        let text = format!("⚠️ [{}] {}", alert.component, alert.message);
        if let Err(e) = self
            .bot
            .send_message(chat_id, &OutboundMessage::plain(text))
            .await
        {
            tracing::warn!(error = %e, "Admin alert not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn api(code: i64) -> TelegramError {
        TelegramError::Api {
            code,
            description: format!("error {}", code),
            retry_after: None,
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(TelegramError::Timeout.is_transient());
        assert!(api(429).is_transient());
        assert!(api(502).is_transient());
        assert!(!api(400).is_transient());
        assert!(!TelegramError::Decode("x".into()).is_transient());
    }

    #[test]
    fn test_delivery_error_mapping() {
        assert!(matches!(DeliveryError::from(api(400)), DeliveryError::Rejected(ref m) if m == "error 400"));
        assert!(matches!(DeliveryError::from(api(503)), DeliveryError::Network(_)));
        assert!(matches!(
            DeliveryError::from(TelegramError::Network("reset".into())),
            DeliveryError::Network(_)
        ));
    }

    #[tokio::test]
    async fn test_ops_alert_posts_to_admin_chat() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botT:1/sendMessage")
                .json_body_includes(r#"{"chat_id": -1001}"#)
                .body_includes("interaction_log");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "result": {"message_id": 1, "chat": {"id": -1001}, "date": 0}
            }));
        });

        let bot = TelegramBot::new(BotApiConfig {
            api_base: server.base_url(),
            bot_token: "T:1".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let ops = TelegramOps::new(Arc::new(bot), Some(ChatId(-1001)));
        ops.alert(&OpsAlert::new("interaction_log", "google_sheets append failed"))
            .await;

        mock.assert();
    }

    #[tokio::test]
    async fn test_ops_alert_without_admin_chat_is_log_only() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(500);
        });

        let bot = TelegramBot::new(BotApiConfig {
            api_base: server.base_url(),
            bot_token: "T:1".to_string(),
            ..Default::default()
        })
        .unwrap();
        TelegramOps::new(Arc::new(bot), None)
            .alert(&OpsAlert::new("interaction_log", "x"))
            .await;

        mock.assert_calls(0);
    }
}
