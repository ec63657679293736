//! Inbound event routing
//!
//! The only place that decides whether a sender is the administrator. Text
//! commands and callback tokens are parsed into state machine events here.

use crate::db::{OrderId, OrderStatus};
use crate::runtime::{ConversationRuntime, Notifier, OrderStore, Outcome, Sender, SessionStore};
use crate::state_machine::event::{AdminCommand, Choice, CommandError, DeleteFilter, Event};
use crate::state_machine::state::AdminAction;
use crate::state_machine::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Text,
    Callback,
}

/// Transport-neutral inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender_id: String,
    pub kind: EventKind,
    pub text: Option<String>,
    pub callback_data: Option<String>,
    pub message_ref: Option<String>,
    /// Sender's transport handle, when the transport provides one
    pub sender_username: Option<String>,
}

impl InboundEvent {
    pub fn text(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            kind: EventKind::Text,
            text: Some(text.into()),
            callback_data: None,
            message_ref: None,
            sender_username: None,
        }
    }

    pub fn callback(
        sender_id: impl Into<String>,
        data: impl Into<String>,
        message_ref: Option<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            kind: EventKind::Callback,
            text: None,
            callback_data: Some(data.into()),
            message_ref,
            sender_username: None,
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.sender_username = username;
        self
    }
}

pub struct Dispatcher<S, O, N>
where
    S: SessionStore,
    O: OrderStore,
    N: Notifier,
{
    runtime: ConversationRuntime<S, O, N>,
}

impl<S, O, N> Dispatcher<S, O, N>
where
    S: SessionStore,
    O: OrderStore,
    N: Notifier,
{
    pub fn new(runtime: ConversationRuntime<S, O, N>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &ConversationRuntime<S, O, N> {
        &self.runtime
    }

    /// The single authorization predicate
    pub fn is_admin(&self, sender_id: &str) -> bool {
        sender_id == self.runtime.admin_id()
    }

    pub async fn dispatch(&self, inbound: InboundEvent) -> Outcome {
        let is_admin = self.is_admin(&inbound.sender_id);
        let Some(event) = parse_event(&inbound, is_admin) else {
            tracing::debug!(
                sender_id = %inbound.sender_id,
                data = ?inbound.callback_data,
                "Ignoring unrecognized callback"
            );
            return Outcome::Refused(TransitionError::OutOfOrder);
        };

        let sender = Sender::new(inbound.sender_id)
            .admin(is_admin)
            .with_username(inbound.sender_username)
            .with_message_ref(inbound.message_ref);
        self.runtime.handle(&sender, event).await
    }
}

/// Turn an inbound event into a state machine event; `None` for unknown buttons
pub fn parse_event(inbound: &InboundEvent, is_admin: bool) -> Option<Event> {
    match inbound.kind {
        EventKind::Callback => {
            let data = inbound.callback_data.as_deref()?.trim();
            if is_admin {
                if let Some(command) = AdminCommand::from_token(data) {
                    return Some(Event::Admin(command));
                }
            }
            Choice::from_token(data).map(Event::Choice)
        }
        EventKind::Text => {
            let text = inbound.text.as_deref().unwrap_or_default();
            Some(parse_text(text, is_admin))
        }
    }
}

pub fn parse_text(text: &str, is_admin: bool) -> Event {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return Event::Text(text.to_string());
    }

    let (head, rest) = trimmed
        .split_once(char::is_whitespace)
        .map_or((trimmed, ""), |(head, rest)| (head, rest.trim()));
    // `/cmd@SomeBot` in group chats
    let command = head
        .split_once('@')
        .map_or(head, |(command, _)| command)
        .to_lowercase();

    match command.as_str() {
        "/start" => return Event::Start,
        "/cancel" => return Event::Cancel,
        "/help" => return Event::Help,
        _ => {}
    }

    let parsed = if is_admin {
        parse_admin(&command, rest).map(Event::Admin)
    } else {
        parse_user(&command, rest)
    };
    parsed.unwrap_or_else(Event::BadCommand)
}

fn parse_user(command: &str, rest: &str) -> Result<Event, CommandError> {
    match command {
        "/track" => Ok(Event::Track {
            order_id: (!rest.is_empty()).then(|| rest.to_string()),
        }),
        "/my_orders" => Ok(Event::MyOrders),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

const PRICE_USAGE: &str = "/price <شناسه> [مبلغ]";
const REJECT_USAGE: &str = "/reject <شناسه> [دلیل]";
const COMPLETE_USAGE: &str = "/complete <شناسه>";
const LIST_USAGE: &str = "/list_orders [pending|priced|completed|rejected]";
const DELETE_USAGE: &str = "/delete_old <روز|completed|rejected>";

fn parse_admin(command: &str, rest: &str) -> Result<AdminCommand, CommandError> {
    match command {
        "/menu" => Ok(AdminCommand::Menu),
        "/stats" => Ok(AdminCommand::Stats),
        "/list_orders" => {
            if rest.is_empty() {
                return Ok(AdminCommand::List { status: None });
            }
            OrderStatus::parse(rest)
                .map(|status| AdminCommand::List {
                    status: Some(status),
                })
                .ok_or(CommandError::Usage(LIST_USAGE))
        }
        "/price" => {
            let (order_id, amount) = target_and_value(rest, PRICE_USAGE)?;
            Ok(match amount {
                Some(amount) => AdminCommand::Price { order_id, amount },
                None => AdminCommand::Target {
                    action: AdminAction::Price,
                    order_id,
                },
            })
        }
        "/reject" => {
            let (order_id, reason) = target_and_value(rest, REJECT_USAGE)?;
            Ok(match reason {
                Some(reason) => AdminCommand::Reject { order_id, reason },
                None => AdminCommand::Target {
                    action: AdminAction::Reject,
                    order_id,
                },
            })
        }
        "/complete" => {
            let (order_id, _) = target_and_value(rest, COMPLETE_USAGE)?;
            Ok(AdminCommand::Complete { order_id })
        }
        "/delete_old" => DeleteFilter::parse(rest)
            .map(AdminCommand::DeleteOld)
            .ok_or(CommandError::Usage(DELETE_USAGE)),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// `<id> [value...]`
fn target_and_value(
    rest: &str,
    usage: &'static str,
) -> Result<(OrderId, Option<String>), CommandError> {
    let (raw_id, value) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(id, value)| (id, value.trim()));
    if raw_id.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    let order_id =
        OrderId::parse(raw_id).ok_or_else(|| CommandError::InvalidOrderId(raw_id.to_string()))?;
    Ok((order_id, (!value.is_empty()).then(|| value.to_string())))
}
