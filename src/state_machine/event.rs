//! Inputs the conversation engine reacts to

use crate::db::{OrderId, OrderStatus};
use crate::state_machine::state::{AdminAction, Field};
use thiserror::Error;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    Start,
    Cancel,
    Help,
    Text(String),
    Choice(Choice),
    Track { order_id: Option<String> },
    MyOrders,

    // Admin events
    Admin(AdminCommand),

    /// Unknown or malformed command
    BadCommand(CommandError),
}

// ============================================================================
// Selection options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessKind {
    Personal,
    Corporate,
    Services,
    Blog,
    Shop,
    Other,
}

impl BusinessKind {
    pub const ALL: [BusinessKind; 6] = [
        BusinessKind::Personal,
        BusinessKind::Corporate,
        BusinessKind::Services,
        BusinessKind::Blog,
        BusinessKind::Shop,
        BusinessKind::Other,
    ];

    pub fn key(self) -> &'static str {
        match self {
            BusinessKind::Personal => "personal",
            BusinessKind::Corporate => "corporate",
            BusinessKind::Services => "services",
            BusinessKind::Blog => "blog",
            BusinessKind::Shop => "shop",
            BusinessKind::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BusinessKind::Personal => "شخصی",
            BusinessKind::Corporate => "شرکتی",
            BusinessKind::Services => "خدماتی",
            BusinessKind::Blog => "وبلاگ",
            BusinessKind::Shop => "فروشگاهی",
            BusinessKind::Other => "سایر",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    /// A typed key or display label
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        let lower = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.key() == lower || k.label() == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurposeKind {
    Introduce,
    Customers,
    Content,
    Sales,
    Other,
}

impl PurposeKind {
    pub const ALL: [PurposeKind; 5] = [
        PurposeKind::Introduce,
        PurposeKind::Customers,
        PurposeKind::Content,
        PurposeKind::Sales,
        PurposeKind::Other,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PurposeKind::Introduce => "introduce",
            PurposeKind::Customers => "customers",
            PurposeKind::Content => "content",
            PurposeKind::Sales => "sales",
            PurposeKind::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PurposeKind::Introduce => "معرفی خدمات",
            PurposeKind::Customers => "جذب مشتری",
            PurposeKind::Content => "ارائه محتوا",
            PurposeKind::Sales => "فروش آنلاین",
            PurposeKind::Other => "سایر",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        let lower = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.key() == lower || k.label() == text)
    }
}

/// A button press decoded from callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Business(BusinessKind),
    Purpose(PurposeKind),
    Domain(bool),
    Support(bool),
    Confirm,
    Discard,
    Edit,
    EditField(Field),
}

fn flag_token(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn parse_flag(token: &str) -> Option<bool> {
    match token {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

impl Choice {
    /// Callback data carried by the button
    pub fn token(&self) -> String {
        match self {
            Choice::Business(kind) => format!("biz:{}", kind.key()),
            Choice::Purpose(kind) => format!("purpose:{}", kind.key()),
            Choice::Domain(v) => format!("domain:{}", flag_token(*v)),
            Choice::Support(v) => format!("support:{}", flag_token(*v)),
            Choice::Confirm => "confirm:yes".to_string(),
            Choice::Discard => "confirm:no".to_string(),
            Choice::Edit => "confirm:edit".to_string(),
            Choice::EditField(field) => format!("edit:{}", field.key()),
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let (kind, value) = token.split_once(':')?;
        match kind {
            "biz" => BusinessKind::from_key(value).map(Choice::Business),
            "purpose" => PurposeKind::from_key(value).map(Choice::Purpose),
            "domain" => parse_flag(value).map(Choice::Domain),
            "support" => parse_flag(value).map(Choice::Support),
            "confirm" => match value {
                "yes" => Some(Choice::Confirm),
                "no" => Some(Choice::Discard),
                "edit" => Some(Choice::Edit),
                _ => None,
            },
            "edit" => Field::from_key(value).map(Choice::EditField),
            _ => None,
        }
    }

    /// Field the choice answers, for option buttons
    pub fn field(&self) -> Option<Field> {
        match self {
            Choice::Business(_) => Some(Field::Business),
            Choice::Purpose(_) => Some(Field::Purpose),
            Choice::Domain(_) => Some(Field::Domain),
            Choice::Support(_) => Some(Field::Support),
            Choice::Confirm | Choice::Discard | Choice::Edit | Choice::EditField(_) => None,
        }
    }
}

// ============================================================================
// Admin commands
// ============================================================================

/// Largest age accepted by `/delete_old`, about a century
pub const MAX_AGE_DAYS: u32 = 36_500;

/// Filter accepted by bulk delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFilter {
    OlderThanDays(u32),
    /// Terminal statuses only
    Status(OrderStatus),
}

impl DeleteFilter {
    pub fn token(self) -> String {
        match self {
            DeleteFilter::OlderThanDays(days) => format!("del:{days}"),
            DeleteFilter::Status(status) => format!("del:{status}"),
        }
    }

    /// Parse the argument of `/delete_old` or a delete button
    pub fn parse(arg: &str) -> Option<Self> {
        let arg = arg.trim();
        if let Ok(days) = arg.parse::<u32>() {
            return (days <= MAX_AGE_DAYS).then_some(DeleteFilter::OlderThanDays(days));
        }
        OrderStatus::parse(arg)
            .filter(|s| s.is_terminal())
            .map(DeleteFilter::Status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Menu,
    /// Start a selection sub-flow
    Begin(AdminAction),
    /// An order picked from a selection keyboard
    Pick {
        action: AdminAction,
        order_id: OrderId,
    },
    /// `/price <id>` or `/reject <id>` without the trailing value
    Target {
        action: AdminAction,
        order_id: OrderId,
    },
    Price {
        order_id: OrderId,
        amount: String,
    },
    Reject {
        order_id: OrderId,
        reason: String,
    },
    Complete {
        order_id: OrderId,
    },
    List {
        status: Option<OrderStatus>,
    },
    Stats,
    DeleteMenu,
    DeleteOld(DeleteFilter),
}

impl AdminCommand {
    /// Callback data for menu and selection buttons
    pub fn token(&self) -> Option<String> {
        match self {
            AdminCommand::Menu => Some("admin:menu".to_string()),
            AdminCommand::Begin(action) => Some(format!("admin:{}", action.key())),
            AdminCommand::Pick { action, order_id } => {
                Some(format!("pick:{}:{order_id}", action.key()))
            }
            AdminCommand::List { status: None } => Some("admin:list".to_string()),
            AdminCommand::Stats => Some("admin:stats".to_string()),
            AdminCommand::DeleteMenu => Some("admin:delete".to_string()),
            AdminCommand::DeleteOld(filter) => Some(filter.token()),
            _ => None,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let (kind, rest) = token.split_once(':')?;
        match kind {
            "admin" => match rest {
                "menu" => Some(AdminCommand::Menu),
                "list" => Some(AdminCommand::List { status: None }),
                "stats" => Some(AdminCommand::Stats),
                "delete" => Some(AdminCommand::DeleteMenu),
                other => AdminAction::from_key(other).map(AdminCommand::Begin),
            },
            "pick" => {
                let (action, id) = rest.split_once(':')?;
                Some(AdminCommand::Pick {
                    action: AdminAction::from_key(action)?,
                    order_id: OrderId::parse(id)?,
                })
            }
            "del" => DeleteFilter::parse(rest).map(AdminCommand::DeleteOld),
            _ => None,
        }
    }
}

/// Why a command could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid order id {0:?}")]
    InvalidOrderId(String),
}
