//! Update → inbound event mapping

use chrono::{DateTime, TimeZone, Utc};
use site_inspector_agent::{CallbackAction, EventKind, InboundEvent};
use site_inspector_core::{AudioMeta, AudioRef, ChatId, RawInput, UserId};

use super::types::{Message, Update};

/// An update the handler should see
#[derive(Debug, Clone)]
pub struct ParsedUpdate {
    pub event: InboundEvent,
    /// Callback queries must be answered to stop the client spinner
    pub callback_id: Option<String>,
}

/// Map one update. Returns `None` for updates that carry nothing to answer:
/// channel posts, messages from other bots, edited messages.
pub fn parse_update(update: Update) -> Option<ParsedUpdate> {
    if let Some(message) = update.message {
        let from = message.from.as_ref()?;
        if from.is_bot {
            return None;
        }
        let event = InboundEvent::new(
            ChatId(message.chat.id),
            UserId(from.id),
            message_kind(&message),
        )
        .received_at(timestamp(message.date));
        return Some(ParsedUpdate {
            event,
            callback_id: None,
        });
    }

    if let Some(query) = update.callback_query {
        // Private chats share the user's id when the message is gone
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);
        let kind = query
            .data
            .as_deref()
            .and_then(CallbackAction::parse)
            .map(EventKind::Callback)
            .unwrap_or(EventKind::Unsupported);
        return Some(ParsedUpdate {
            event: InboundEvent::new(ChatId(chat_id), UserId(query.from.id), kind),
            callback_id: Some(query.id),
        });
    }

    None
}

fn message_kind(message: &Message) -> EventKind {
    if let Some(text) = &message.text {
        return EventKind::from_text(text);
    }
    if let Some(voice) = &message.voice {
        return EventKind::Report(RawInput::Voice(AudioRef {
            file_id: voice.file_id.clone(),
            meta: AudioMeta::from_transport(
                voice.mime_type.as_deref(),
                None,
                voice.duration,
                voice.file_size,
            ),
        }));
    }
    if let Some(audio) = &message.audio {
        return EventKind::Report(RawInput::Voice(AudioRef {
            file_id: audio.file_id.clone(),
            meta: AudioMeta::from_transport(
                audio.mime_type.as_deref(),
                audio.file_name.as_deref(),
                audio.duration,
                audio.file_size,
            ),
        }));
    }
    EventKind::Unsupported
}

fn timestamp(unix: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(unix, 0).single().unwrap_or_else(Utc::now)
}
