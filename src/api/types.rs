//! Telegram webhook payloads and API responses

use crate::dispatch::InboundEvent;
use serde::{Deserialize, Serialize};

/// One webhook delivery; only the fields the bot reads
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl Update {
    /// Id of the callback query to acknowledge, if any
    pub fn callback_id(&self) -> Option<&str> {
        self.callback_query.as_ref().map(|q| q.id.as_str())
    }

    /// The inbound event this update carries, or `None` for updates the bot ignores
    pub fn into_inbound(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            if query.from.is_bot {
                return None;
            }
            let data = query.data?;
            let message_ref = query.message.map(|m| m.message_id.to_string());
            return Some(
                InboundEvent::callback(query.from.id.to_string(), data, message_ref)
                    .with_username(query.from.username),
            );
        }

        let message = self.message?;
        if message.chat.kind != "private" {
            return None;
        }
        let from = message.from?;
        if from.is_bot {
            return None;
        }
        // Stickers, photos and the like count as an empty answer
        let text = message.text.unwrap_or_default();
        Some(InboundEvent::text(from.id.to_string(), text).with_username(from.username))
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
