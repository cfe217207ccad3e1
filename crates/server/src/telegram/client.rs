//! Telegram Bot API client
//!
//! Long polling, message delivery and file download over plain HTTPS.
//! Implements the core `ReplyChannel` and `AudioFetcher` traits so the
//! handler never sees Bot API details.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use site_inspector_config::Settings;
use site_inspector_core::{
    AudioFetcher, AudioPayload, AudioRef, ChatId, DeliveryError, MessageRef, OutboundMessage,
    ReplyChannel, TranscriptionError,
};

use super::types::{
    ApiResponse, File, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update, User,
};
use super::TelegramError;

/// Margin on top of the long-poll wait before the HTTP request gives up
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Bot API client configuration
#[derive(Debug, Clone)]
pub struct BotApiConfig {
    pub api_base: String,
    pub bot_token: String,
    /// Server-side wait of `getUpdates`
    pub poll_timeout: Duration,
    /// Ordinary method calls
    pub request_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for BotApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            poll_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(20),
        }
    }
}

impl BotApiConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_base: settings.telegram.api_base.clone(),
            bot_token: settings.telegram.bot_token.clone(),
            poll_timeout: Duration::from_secs(settings.telegram.poll_timeout_secs),
            download_timeout: settings.timeouts.download(),
            ..Default::default()
        }
    }
}

pub struct TelegramBot {
    config: BotApiConfig,
    client: Client,
}

impl TelegramBot {
    pub fn new(config: BotApiConfig) -> Result<Self, TelegramError> {
        if config.bot_token.trim().is_empty() {
            return Err(TelegramError::Configuration(
                "bot token is empty".to_string(),
            ));
        }

        // Per-request timeouts; long polls need more than ordinary calls
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                TelegramError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base(), self.config.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.base(),
            self.config.bot_token,
            file_path.trim_start_matches('/')
        )
    }

    /// Call a Bot API method with a JSON body
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TelegramError::Decode(format!("{}: {}", method, e.without_url())))?;

        if !envelope.ok {
            return Err(TelegramError::Api {
                code: envelope.error_code.unwrap_or(i64::from(status.as_u16())),
                description: envelope.description.unwrap_or_default(),
                retry_after: envelope.parameters.and_then(|p| p.retry_after),
            });
        }

        envelope
            .result
            .ok_or_else(|| TelegramError::Decode(format!("{}: ok response without result", method)))
    }

    /// Identity of the bot; used as a startup check of the token
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({}), self.config.request_timeout)
            .await
    }

    /// Long poll for updates starting at `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let body = json!({
            "offset": offset,
            "timeout": self.config.poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &body, self.config.poll_timeout + POLL_GRACE)
            .await
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        message: &OutboundMessage,
    ) -> Result<Message, TelegramError> {
        let mut body = json!({
            "chat_id": chat_id.0,
            "text": message.text,
            "disable_web_page_preview": true,
        });
        if message.html {
            body["parse_mode"] = json!("HTML");
        }
        if !message.buttons.is_empty() {
            let markup = InlineKeyboardMarkup {
                inline_keyboard: message
                    .buttons
                    .iter()
                    .map(|b| {
                        vec![InlineKeyboardButton {
                            text: b.text.clone(),
                            callback_data: b.callback_data.clone(),
                        }]
                    })
                    .collect(),
            };
            body["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| TelegramError::Decode(e.to_string()))?;
        }
        self.call("sendMessage", &body, self.config.request_timeout)
            .await
    }

    pub async fn edit_message_text(
        &self,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), TelegramError> {
        let body = json!({
            "chat_id": message.chat_id.0,
            "message_id": message.message_id,
            "text": text,
        });
        self.call::<Value>("editMessageText", &body, self.config.request_timeout)
            .await
            .map(|_| ())
    }

    pub async fn delete_message(&self, message: &MessageRef) -> Result<(), TelegramError> {
        let body = json!({
            "chat_id": message.chat_id.0,
            "message_id": message.message_id,
        });
        self.call::<bool>("deleteMessage", &body, self.config.request_timeout)
            .await
            .map(|_| ())
    }

    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), TelegramError> {
        let body = json!({ "callback_query_id": callback_id });
        self.call::<bool>("answerCallbackQuery", &body, self.config.request_timeout)
            .await
            .map(|_| ())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &json!({ "file_id": file_id }), self.config.request_timeout)
            .await
    }

    /// Download a file by the path `getFile` returned
    pub async fn download_file(&self, file_path: &str) -> Result<Bytes, TelegramError> {
        let response = self
            .client
            .get(self.file_url(file_path))
            .timeout(self.config.download_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: format!("file download failed for {}", file_path),
                retry_after: None,
            });
        }

        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl ReplyChannel for TelegramBot {
    async fn send(
        &self,
        chat_id: ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageRef, DeliveryError> {
        let sent = self.send_message(chat_id, message).await?;
        Ok(MessageRef {
            chat_id: ChatId(sent.chat.id),
            message_id: sent.message_id,
        })
    }

    async fn edit(&self, message: &MessageRef, text: &str) -> Result<(), DeliveryError> {
        Ok(self.edit_message_text(message, text).await?)
    }

    async fn delete(&self, message: &MessageRef) -> Result<(), DeliveryError> {
        Ok(self.delete_message(message).await?)
    }
}

#[async_trait]
impl AudioFetcher for TelegramBot {
    async fn fetch(&self, audio: &AudioRef) -> Result<AudioPayload, TranscriptionError> {
        let file = self.get_file(&audio.file_id).await?;
        let path = file.file_path.ok_or_else(|| {
            TranscriptionError::AudioUnavailable(format!(
                "file {} has no download path",
                audio.file_id
            ))
        })?;

        let bytes = self.download_file(&path).await?;
        tracing::debug!(
            file_id = %audio.file_id,
            announced_bytes = ?file.file_size,
            bytes = bytes.len(),
            "Telegram file downloaded"
        );
        Ok(AudioPayload::new(audio.meta.format, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use site_inspector_core::{AudioFormat, AudioMeta, InlineButton};

    const TOKEN: &str = "123:TEST";

    fn bot(server: &MockServer) -> TelegramBot {
        TelegramBot::new(BotApiConfig {
            api_base: server.base_url(),
            bot_token: TOKEN.to_string(),
            poll_timeout: Duration::from_secs(0),
            request_timeout: Duration::from_secs(2),
            download_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    fn sent_message(chat_id: i64, message_id: i64) -> Value {
        json!({
            "ok": true,
            "result": {"message_id": message_id, "chat": {"id": chat_id, "type": "private"}, "date": 0}
        })
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = TelegramBot::new(BotApiConfig::default());
        assert!(matches!(result, Err(TelegramError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_send_html_with_keyboard() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{}/sendMessage", TOKEN))
                .json_body_includes(r#"{"chat_id": 42, "parse_mode": "HTML"}"#)
                .json_body_includes(
                    r#"{"reply_markup": {"inline_keyboard": [[{"text": "🚨 Сообщить о нарушении", "callback_data": "new_violation"}]]}}"#,
                );
            then.status(200).json_body(sent_message(42, 77));
        });

        let message = OutboundMessage::html("<b>Классификация</b>")
            .with_button(InlineButton::new("🚨 Сообщить о нарушении", "new_violation"));
        let sent = bot(&server).send(ChatId(42), &message).await.unwrap();

        mock.assert();
        assert_eq!(sent, MessageRef { chat_id: ChatId(42), message_id: 77 });
    }

    #[tokio::test]
    async fn test_plain_message_has_no_parse_mode() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{}/sendMessage", TOKEN))
                .json_body(json!({
                    "chat_id": 5,
                    "text": "<not markup>",
                    "disable_web_page_preview": true
                }));
            then.status(200).json_body(sent_message(5, 1));
        });

        bot(&server)
            .send(ChatId(5), &OutboundMessage::plain("<not markup>"))
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_api_error_maps_to_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(format!("/bot{}/sendMessage", TOKEN));
            then.status(403).json_body(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            }));
        });

        let err = bot(&server)
            .send(ChatId(5), &OutboundMessage::plain("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(ref m) if m.contains("blocked")));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_network() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(format!("/bot{}/editMessageText", TOKEN));
            then.status(429).json_body(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 2",
                "parameters": {"retry_after": 2}
            }));
        });

        let target = MessageRef { chat_id: ChatId(5), message_id: 9 };
        let err = bot(&server).edit(&target, "🔍").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Network(_)));
    }

    #[tokio::test]
    async fn test_delete_message() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{}/deleteMessage", TOKEN))
                .json_body(json!({"chat_id": 5, "message_id": 9}));
            then.status(200).json_body(json!({"ok": true, "result": true}));
        });

        let target = MessageRef { chat_id: ChatId(5), message_id: 9 };
        bot(&server).delete(&target).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_get_updates_sends_offset() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{}/getUpdates", TOKEN))
                .json_body_includes(r#"{"offset": 11, "timeout": 0}"#);
            then.status(200).json_body(json!({
                "ok": true,
                "result": [
                    {"update_id": 11, "message": {"message_id": 1, "from": {"id": 3}, "chat": {"id": 3}, "date": 0, "text": "Нет ограждения"}}
                ]
            }));
        });

        let updates = bot(&server).get_updates(11).await.unwrap();
        mock.assert();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 11);
    }

    #[tokio::test]
    async fn test_fetch_downloads_file() {
        let server = MockServer::start();
        let get_file = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{}/getFile", TOKEN))
                .json_body(json!({"file_id": "AwAD"}));
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"file_id": "AwAD", "file_size": 8, "file_path": "voice/file_1.oga"}
            }));
        });
        let download = server.mock(|when, then| {
            when.method(GET)
                .path(format!("/file/bot{}/voice/file_1.oga", TOKEN));
            then.status(200).body(b"OggS\x00\x02\x00\x00");
        });

        let audio = AudioRef {
            file_id: "AwAD".to_string(),
            meta: AudioMeta::new(AudioFormat::Unknown, Duration::from_secs(3)),
        };
        let payload = bot(&server).fetch(&audio).await.unwrap();

        get_file.assert();
        download.assert();
        assert_eq!(payload.len(), 8);
        assert_eq!(payload.format, AudioFormat::OggOpus);
    }

    #[tokio::test]
    async fn test_fetch_without_path_is_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(format!("/bot{}/getFile", TOKEN));
            then.status(200)
                .json_body(json!({"ok": true, "result": {"file_id": "AwAD"}}));
        });

        let audio = AudioRef {
            file_id: "AwAD".to_string(),
            meta: AudioMeta::new(AudioFormat::OggOpus, Duration::from_secs(3)),
        };
        let err = bot(&server).fetch(&audio).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::AudioUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_download_is_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(format!("/bot{}/getFile", TOKEN));
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"file_id": "AwAD", "file_path": "voice/gone.oga"}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path_includes("/file/");
            then.status(404);
        });

        let audio = AudioRef {
            file_id: "AwAD".to_string(),
            meta: AudioMeta::new(AudioFormat::OggOpus, Duration::from_secs(3)),
        };
        let err = bot(&server).fetch(&audio).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::AudioUnavailable(_)));
    }
}
