//! Outbound transport traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::report::ChatId;

/// Inline keyboard button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Message sent back to a chat
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    /// Rendered as a single-column inline keyboard
    pub buttons: Vec<InlineButton>,
    /// Text uses HTML markup
    pub html: bool,
}

impl OutboundMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
            html: true,
        }
    }

    pub fn with_button(mut self, button: InlineButton) -> Self {
        self.buttons.push(button);
        self
    }
}

/// Handle to a message already delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// User-facing replies
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send(
        &self,
        chat_id: ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageRef, DeliveryError>;

    /// Replace the text of a delivered message
    async fn edit(&self, message: &MessageRef, text: &str) -> Result<(), DeliveryError>;

    async fn delete(&self, message: &MessageRef) -> Result<(), DeliveryError>;
}

/// Operator alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpsAlert {
    pub component: String,
    pub message: String,
}

impl OpsAlert {
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Operational channel for failures users must not see
#[async_trait]
pub trait OpsChannel: Send + Sync {
    /// Best-effort; implementations swallow their own delivery errors
    async fn alert(&self, alert: &OpsAlert);
}

/// Ops channel that only emits structured log events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOps;

#[async_trait]
impl OpsChannel for TracingOps {
    async fn alert(&self, alert: &OpsAlert) {
        tracing::error!(
            target: "ops",
            component = %alert.component,
            detail = %alert.message,
            "Operational alert"
        );
    }
}
