//! Telegram Bot API client
//!
//! Outbound half of the transport: sends and edits messages with inline
//! keyboards and looks up display names. Inbound updates arrive through the
//! webhook in `api`.

use crate::messages;
use crate::runtime::{Notifier, NotifyError, NotifyOptions};
use crate::state_machine::effect::Keyboard;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TelegramClient {
    client: Client,
    /// `<api base>/bot<token>`
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        })
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, NotifyError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await?;
        let reply: ApiReply<T> = response.json().await?;
        reply.into_result(method)
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), NotifyError> {
        let body = SendMessage {
            chat_id,
            text,
            reply_markup: keyboard.map(ReplyMarkup::from),
        };
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    pub async fn edit_message(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), NotifyError> {
        let message_id: i64 = message_id.parse().map_err(|_| NotifyError::Api {
            method: "editMessageText",
            description: format!("bad message id {message_id}"),
        })?;
        let body = EditMessageText {
            chat_id,
            message_id,
            text,
            reply_markup: keyboard.map(ReplyMarkup::from),
        };
        let _: serde_json::Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    /// Stop the client's button spinner
    pub async fn answer_callback(&self, callback_query_id: &str) -> Result<(), NotifyError> {
        let body = AnswerCallbackQuery { callback_query_id };
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), NotifyError> {
        let body = SetWebhook {
            url,
            secret_token: secret,
            allowed_updates: &["message", "callback_query"],
        };
        let _: bool = self.call("setWebhook", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(
        &self,
        recipient: &str,
        content: &str,
        options: &NotifyOptions,
    ) -> Result<(), NotifyError> {
        let chunks = messages::chunk(content, messages::MAX_MESSAGE_CHARS);
        let last = chunks.len().saturating_sub(1);

        for (i, part) in chunks.iter().enumerate() {
            // The keyboard belongs under the final part
            let keyboard = if i == last { options.keyboard.as_ref() } else { None };
            match (&options.edit_of, i) {
                (Some(message_id), 0) => {
                    if let Err(e) = self.edit_message(recipient, message_id, part, keyboard).await {
                        // Old or already-identical messages cannot be edited
                        tracing::debug!(recipient, error = %e, "Edit failed, sending instead");
                        self.send_message(recipient, part, keyboard).await?;
                    }
                }
                _ => self.send_message(recipient, part, keyboard).await?,
            }
        }
        Ok(())
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, NotifyError> {
        let chat: Chat = self.call("getChat", &GetChat { chat_id: user_id }).await?;
        Ok(chat.display_name())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiReply<T> {
    fn into_result(self, method: &'static str) -> Result<T, NotifyError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(NotifyError::Api {
                method,
                description: self
                    .description
                    .unwrap_or_else(|| "no result".to_string()),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct EditMessageText<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SetWebhook<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct GetChat<'a> {
    chat_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplyMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

impl<'a> From<&'a Keyboard> for ReplyMarkup<'a> {
    fn from(keyboard: &'a Keyboard) -> Self {
        Self {
            inline_keyboard: keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineButton {
                            text: &button.label,
                            callback_data: &button.data,
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Chat {
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl Chat {
    fn display_name(&self) -> Option<String> {
        if let Some(username) = &self.username {
            return Some(format!("@{username}"));
        }
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        (!full.trim().is_empty()).then_some(full)
    }
}
