//! Bot API wire types
//!
//! Only the fields the bot reads are declared; everything else in the
//! update payload is ignored.

use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub voice: Option<Voice>,
    pub audio: Option<Audio>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Voice note recorded in the client
#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    pub file_id: String,
    #[serde(default)]
    pub duration: u64,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

/// Audio file sent as a document-like attachment
#[derive(Debug, Clone, Deserialize)]
pub struct Audio {
    pub file_id: String,
    #[serde(default)]
    pub duration: u64,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Result of `getFile`
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_size: Option<u64>,
    /// Missing when the file is no longer downloadable
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_update_deserializes() {
        let raw = r#"{
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "is_bot": false, "first_name": "Иван"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "voice": {"file_id": "AwAD", "file_unique_id": "u", "duration": 7, "mime_type": "audio/ogg", "file_size": 12000}
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let message = update.message.unwrap();
        let voice = message.voice.unwrap();
        assert_eq!(voice.duration, 7);
        assert_eq!(voice.file_size, Some(12000));
        assert!(message.text.is_none());
    }

    #[test]
    fn test_error_envelope() {
        let raw = r#"{"ok": false, "error_code": 429, "description": "Too Many Requests", "parameters": {"retry_after": 3}}"#;
        let response: ApiResponse<File> = serde_json::from_str(raw).unwrap();
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(429));
        assert_eq!(response.parameters.and_then(|p| p.retry_after), Some(3));
    }
}
