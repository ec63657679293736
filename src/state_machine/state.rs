//! Session state types

use crate::db::{OrderId, Submission};
use serde::{Deserialize, Serialize};

// ============================================================================
// Fields and intake steps
// ============================================================================

/// A field of the intake form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Phone,
    Email,
    Business,
    Purpose,
    Features,
    Domain,
    Extra,
    Support,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Phone,
        Field::Email,
        Field::Business,
        Field::Purpose,
        Field::Features,
        Field::Domain,
        Field::Extra,
        Field::Support,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::Business => "business",
            Field::Purpose => "purpose",
            Field::Features => "features",
            Field::Domain => "domain",
            Field::Extra => "extra",
            Field::Support => "support",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Persian label used in summaries and the edit menu
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "نام و نام خانوادگی",
            Field::Phone => "شماره تماس",
            Field::Email => "ایمیل",
            Field::Business => "نوع کسب‌وکار",
            Field::Purpose => "هدف وب‌سایت",
            Field::Features => "ویژگی‌ها",
            Field::Domain => "دامنه/هاست",
            Field::Extra => "توضیحات تکمیلی",
            Field::Support => "پشتیبانی",
        }
    }
}

/// Position in the intake form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Name,
    Phone,
    Email,
    Business,
    BusinessCustom,
    Purpose,
    PurposeCustom,
    Features,
    Domain,
    Extra,
    Support,
    /// Review summary shown, waiting for yes / no / edit
    Confirm,
    /// Re-entering one field from the review screen
    Editing {
        field: Field,
        /// Free-text follow-up after choosing "other"
        custom: bool,
    },
}

impl Step {
    /// The field this step collects, and whether it is the free-text follow-up
    pub fn target(self) -> Option<(Field, bool)> {
        match self {
            Step::Name => Some((Field::Name, false)),
            Step::Phone => Some((Field::Phone, false)),
            Step::Email => Some((Field::Email, false)),
            Step::Business => Some((Field::Business, false)),
            Step::BusinessCustom => Some((Field::Business, true)),
            Step::Purpose => Some((Field::Purpose, false)),
            Step::PurposeCustom => Some((Field::Purpose, true)),
            Step::Features => Some((Field::Features, false)),
            Step::Domain => Some((Field::Domain, false)),
            Step::Extra => Some((Field::Extra, false)),
            Step::Support => Some((Field::Support, false)),
            Step::Editing { field, custom } => Some((field, custom)),
            Step::Confirm => None,
        }
    }

    /// First-pass step that asks for `field`
    pub fn asking(field: Field) -> Self {
        match field {
            Field::Name => Step::Name,
            Field::Phone => Step::Phone,
            Field::Email => Step::Email,
            Field::Business => Step::Business,
            Field::Purpose => Step::Purpose,
            Field::Features => Step::Features,
            Field::Domain => Step::Domain,
            Field::Extra => Step::Extra,
            Field::Support => Step::Support,
        }
    }

    /// Free-text follow-up step for `field` during the first pass
    pub fn custom_for(field: Field) -> Option<Self> {
        match field {
            Field::Business => Some(Step::BusinessCustom),
            Field::Purpose => Some(Step::PurposeCustom),
            _ => None,
        }
    }

    pub fn is_editing(self) -> bool {
        matches!(self, Step::Editing { .. })
    }
}

/// Field that follows `field` in the first pass; `None` after support
pub fn next_field(field: Field) -> Option<Field> {
    let pos = Field::ALL.iter().position(|f| *f == field)?;
    Field::ALL.get(pos + 1).copied()
}

// ============================================================================
// Answers
// ============================================================================

/// A validated value for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Field, String),
    Flag(Field, bool),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::Text(field, _) | FieldValue::Flag(field, _) => *field,
        }
    }
}

/// Structured record of the answers collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answers {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub business: Option<String>,
    pub purpose: Option<String>,
    pub features: Option<String>,
    pub has_domain: Option<bool>,
    pub extra: Option<String>,
    pub wants_support: Option<bool>,
}

impl Answers {
    pub fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::Text(Field::Name, v) => self.name = Some(v),
            FieldValue::Text(Field::Phone, v) => self.phone = Some(v),
            FieldValue::Text(Field::Email, v) => self.email = Some(v),
            FieldValue::Text(Field::Business, v) => self.business = Some(v),
            FieldValue::Text(Field::Purpose, v) => self.purpose = Some(v),
            FieldValue::Text(Field::Features, v) => self.features = Some(v),
            FieldValue::Text(Field::Extra, v) => self.extra = Some(v),
            FieldValue::Flag(Field::Domain, v) => self.has_domain = Some(v),
            FieldValue::Flag(Field::Support, v) => self.wants_support = Some(v),
            FieldValue::Text(field, _) | FieldValue::Flag(field, _) => {
                tracing::warn!(field = field.key(), "Ignoring value of the wrong kind");
            }
        }
    }

    /// Display string for a field, if answered
    pub fn display(&self, field: Field) -> Option<String> {
        let flag = |v: Option<bool>| v.map(|b| if b { "بله" } else { "خیر" }.to_string());
        match field {
            Field::Name => self.name.clone(),
            Field::Phone => self.phone.clone(),
            Field::Email => self.email.clone(),
            Field::Business => self.business.clone(),
            Field::Purpose => self.purpose.clone(),
            Field::Features => self.features.clone(),
            Field::Domain => flag(self.has_domain),
            Field::Extra => self.extra.clone(),
            Field::Support => flag(self.wants_support),
        }
    }

    /// First field still missing
    pub fn first_missing(&self) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|f| self.display(*f).is_none())
    }

    /// Build the order submission; `None` if any field is unanswered
    pub fn to_submission(
        &self,
        id: OrderId,
        chat_id: &str,
        username: Option<&str>,
    ) -> Option<Submission> {
        Some(Submission {
            id,
            chat_id: chat_id.to_string(),
            username: username.map(str::to_string),
            name: self.name.clone()?,
            phone: self.phone.clone()?,
            email: self.email.clone()?,
            business: self.business.clone()?,
            purpose: self.purpose.clone()?,
            features: self.features.clone()?,
            has_domain: self.has_domain?,
            extra: self.extra.clone()?,
            wants_support: self.wants_support?,
        })
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// In-progress intake form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeSession {
    pub step: Step,
    pub answers: Answers,
    /// Assigned once when the review screen is first shown
    pub order_id: Option<OrderId>,
}

impl IntakeSession {
    pub fn new() -> Self {
        Self {
            step: Step::Name,
            answers: Answers::default(),
            order_id: None,
        }
    }
}

impl Default for IntakeSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Administrator actions that target a single order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Price,
    Reject,
    Complete,
}

impl AdminAction {
    pub fn key(self) -> &'static str {
        match self {
            AdminAction::Price => "price",
            AdminAction::Reject => "reject",
            AdminAction::Complete => "complete",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "price" => Some(AdminAction::Price),
            "reject" => Some(AdminAction::Reject),
            "complete" => Some(AdminAction::Complete),
            _ => None,
        }
    }
}

/// Administrator sub-flow position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminStep {
    /// Eligible orders listed, waiting for a pick
    Selecting { action: AdminAction },
    WaitingPrice { order_id: OrderId },
    WaitingReason { order_id: OrderId },
}

/// Per-identity conversation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Session {
    Intake(IntakeSession),
    /// Waiting for an order id to look up
    Tracking {
        /// Unfinished form to pick back up once the lookup is done
        #[serde(default)]
        resume: Option<IntakeSession>,
    },
    Admin(AdminStep),
}

impl Session {
    /// Order this session refers to, if any
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Session::Intake(intake) => intake.order_id.as_ref(),
            Session::Admin(AdminStep::WaitingPrice { order_id } | AdminStep::WaitingReason { order_id }) => {
                Some(order_id)
            }
            Session::Tracking { resume } => resume.as_ref().and_then(|intake| intake.order_id.as_ref()),
            Session::Admin(AdminStep::Selecting { .. }) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Session::Intake(_) => "intake",
            Session::Tracking { .. } => "tracking",
            Session::Admin(_) => "admin",
        }
    }
}

/// Per-event context supplied by the runtime
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub user_id: String,
    pub admin_id: String,
    /// Decided once by the dispatcher
    pub is_admin: bool,
    /// Transport handle of the sender, stored on new orders
    pub username: Option<String>,
    /// Message the event came from (callbacks only); replies may edit it
    pub message_ref: Option<String>,
    /// Pre-generated id used if this event opens the review screen
    pub order_id_candidate: OrderId,
}

impl ConvContext {
    pub fn new(
        user_id: impl Into<String>,
        admin_id: impl Into<String>,
        order_id_candidate: OrderId,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            admin_id: admin_id.into(),
            is_admin: false,
            username: None,
            message_ref: None,
            order_id_candidate,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_message_ref(mut self, message_ref: Option<String>) -> Self {
        self.message_ref = message_ref;
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}
