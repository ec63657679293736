//! Effects produced by state transitions

use crate::db::{OrderId, OrderStatus, Submission};
use crate::state_machine::event::DeleteFilter;
use crate::state_machine::state::{AdminAction, ConvContext};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send (or edit) a message
    Notify(Notice),

    /// Append the confirmed order, then tell the admin and the owner
    CommitOrder(Box<Submission>),

    /// Look up one order on behalf of its owner
    Track { order_id: OrderId },

    /// List the requester's own orders
    ListMine,

    /// List orders eligible for an admin action as a keyboard
    ShowSelection { action: AdminAction },

    /// Apply an admin decision to an order
    ApplyAdmin(AdminOp),

    ListOrders { status: Option<OrderStatus> },

    ShowStats,

    DeleteOrders(DeleteFilter),
}

/// Admin decision on a single order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOp {
    Price { order_id: OrderId, amount: u64 },
    Reject { order_id: OrderId, reason: String },
    Complete { order_id: OrderId },
}

impl AdminOp {
    pub fn order_id(&self) -> &OrderId {
        match self {
            AdminOp::Price { order_id, .. }
            | AdminOp::Reject { order_id, .. }
            | AdminOp::Complete { order_id } => order_id,
        }
    }

    pub fn action(&self) -> AdminAction {
        match self {
            AdminOp::Price { .. } => AdminAction::Price,
            AdminOp::Reject { .. } => AdminAction::Reject,
            AdminOp::Complete { .. } => AdminAction::Complete,
        }
    }

    /// Status the order moves to
    pub fn target_status(&self) -> OrderStatus {
        match self {
            AdminOp::Price { .. } => OrderStatus::Priced,
            AdminOp::Reject { .. } => OrderStatus::Rejected,
            AdminOp::Complete { .. } => OrderStatus::Completed,
        }
    }
}

// ============================================================================
// Outbound messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Inline keyboard description, rows of buttons
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn row(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        let row: Vec<Button> = buttons.into_iter().collect();
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    /// One button per row
    pub fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every callback token on the keyboard
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.data.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub to: String,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Message to replace instead of sending a new one
    pub edit_of: Option<String>,
}

impl Notice {
    pub fn new(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            text: text.into(),
            keyboard: None,
            edit_of: None,
        }
    }

    /// Reply to the sender of the current event
    pub fn reply(ctx: &ConvContext, text: impl Into<String>) -> Self {
        Self::new(ctx.user_id.clone(), text)
    }

    /// Replace the message whose button was pressed, or reply if there is none
    pub fn replace(ctx: &ConvContext, text: impl Into<String>) -> Self {
        Self {
            edit_of: ctx.message_ref.clone(),
            ..Self::reply(ctx, text)
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Option<Keyboard>) -> Self {
        self.keyboard = keyboard.filter(|k| !k.is_empty());
        self
    }
}

impl Effect {
    pub fn reply(ctx: &ConvContext, text: impl Into<String>) -> Self {
        Effect::Notify(Notice::reply(ctx, text))
    }

    pub fn reply_with(ctx: &ConvContext, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Notify(Notice::reply(ctx, text).with_keyboard(Some(keyboard)))
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Effect::Notify(notice) => Some(notice),
            _ => None,
        }
    }
}
