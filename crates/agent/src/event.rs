//! Inbound bot events, transport-neutral

use chrono::{DateTime, Utc};

use site_inspector_core::{ChatId, RawInput, UserId};

/// Bot command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    /// Parse `/start`, `/help@SiteInspectorBot` and the like.
    /// Unknown commands return `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Inline keyboard callback payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    NewViolation,
}

impl CallbackAction {
    pub const NEW_VIOLATION: &'static str = "new_violation";

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            Self::NEW_VIOLATION => Some(Self::NewViolation),
            _ => None,
        }
    }

    pub fn as_data(&self) -> &'static str {
        match self {
            Self::NewViolation => Self::NEW_VIOLATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Text or voice violation report
    Report(RawInput),
    Command(Command),
    Callback(CallbackAction),
    /// Stickers, photos, unknown commands and other content we do not handle
    Unsupported,
}

impl EventKind {
    /// Classify a text message. Anything starting with `/` is a command,
    /// known or not, and never becomes a report.
    pub fn from_text(text: &str) -> Self {
        if text.trim_start().starts_with('/') {
            return Command::parse(text)
                .map(Self::Command)
                .unwrap_or(Self::Unsupported);
        }
        Self::Report(RawInput::Text(text.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Report(RawInput::Text(_)) => "text",
            Self::Report(RawInput::Voice(_)) => "voice",
            Self::Command(_) => "command",
            Self::Callback(_) => "callback",
            Self::Unsupported => "unsupported",
        }
    }
}

/// One inbound event with its sender
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub received_at: DateTime<Utc>,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(chat_id: ChatId, user_id: UserId, kind: EventKind) -> Self {
        Self {
            chat_id,
            user_id,
            received_at: Utc::now(),
            kind,
        }
    }

    pub fn text(chat_id: ChatId, user_id: UserId, text: impl Into<String>) -> Self {
        Self::new(chat_id, user_id, EventKind::from_text(&text.into()))
    }

    pub fn received_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.received_at = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /HELP  "), Some(Command::Help));
        assert_eq!(Command::parse("/help@SiteInspectorBot extra"), Some(Command::Help));
        assert_eq!(Command::parse("/stop"), None);
        assert_eq!(Command::parse("start"), None);
    }

    #[test]
    fn test_text_classification() {
        assert_eq!(
            EventKind::from_text("/start"),
            EventKind::Command(Command::Start)
        );
        assert_eq!(EventKind::from_text("/unknown"), EventKind::Unsupported);
        assert_eq!(
            EventKind::from_text("нет перил на лестнице"),
            EventKind::Report(RawInput::Text("нет перил на лестнице".into()))
        );
    }

    #[test]
    fn test_callback_roundtrip() {
        let action = CallbackAction::parse("new_violation").unwrap();
        assert_eq!(action.as_data(), "new_violation");
        assert_eq!(CallbackAction::parse("other"), None);
    }
}
