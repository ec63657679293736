//! Runtime for executing conversations
//!
//! Wires the pure state machine to the session store, the order store and the
//! outbound notifier.

mod executor;
mod locks;
mod sessions;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRuntime, Outcome};
pub use sessions::InMemorySessions;
pub use traits::*;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    ConversationRuntime<InMemorySessions, DatabaseStorage, crate::telegram::TelegramClient>;

/// Who sent an inbound event, as resolved by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: String,
    pub username: Option<String>,
    /// Message whose button was pressed, for callbacks
    pub message_ref: Option<String>,
    pub is_admin: bool,
}

impl Sender {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            message_ref: None,
            is_admin: false,
        }
    }

    #[must_use]
    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    #[must_use]
    pub fn with_message_ref(mut self, message_ref: Option<String>) -> Self {
        self.message_ref = message_ref;
        self
    }
}
