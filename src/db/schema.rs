//! Order record types

use crate::calendar;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for the SQLite backend
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS orders (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    created_display TEXT NOT NULL,
    chat_id TEXT NOT NULL,
    username TEXT,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    email TEXT NOT NULL,
    business TEXT NOT NULL,
    purpose TEXT NOT NULL,
    features TEXT NOT NULL,
    has_domain BOOLEAN NOT NULL,
    extra TEXT NOT NULL,
    wants_support BOOLEAN NOT NULL,
    status TEXT NOT NULL,
    status_text TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orders_chat ON orders(chat_id);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
CREATE INDEX IF NOT EXISTS idx_orders_created ON orders(created_at);
";

// ============================================================================
// Order identifier
// ============================================================================

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_SUFFIX_LEN: usize = 8;

/// Globally unique order identifier: `ORD-` followed by 8 uppercase alphanumerics
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub const PREFIX: &'static str = "ORD-";

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| char::from(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())]))
            .collect();
        Self(format!("{}{suffix}", Self::PREFIX))
    }

    /// Parse user-typed input, accepting lowercase and surrounding whitespace
    pub fn parse(input: &str) -> Option<Self> {
        let upper = input.trim().to_ascii_uppercase();
        let suffix = upper.strip_prefix(Self::PREFIX)?;
        let well_formed = suffix.len() == ID_SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        well_formed.then_some(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Priced,
    Completed,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Priced,
        OrderStatus::Completed,
        OrderStatus::Rejected,
    ];

    /// Forward-only lifecycle. `Priced -> Priced` is a re-quote.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Priced | OrderStatus::Rejected)
                | (OrderStatus::Priced, OrderStatus::Priced | OrderStatus::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Priced => "priced",
            OrderStatus::Completed => "completed",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Persian display label
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "در انتظار بررسی",
            OrderStatus::Priced => "قیمت‌گذاری شده",
            OrderStatus::Completed => "تکمیل شده",
            OrderStatus::Rejected => "رد شده",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Order record
// ============================================================================

/// Collected answers for one confirmed intake, before it becomes an `Order`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: OrderId,
    pub chat_id: String,
    pub username: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub business: String,
    pub purpose: String,
    pub features: String,
    pub has_domain: bool,
    pub extra: String,
    pub wants_support: bool,
}

/// A committed order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    /// Solar Hijri rendering of `created_at` in Tehran time
    pub created_display: String,
    /// Owning chat; every notification about the order goes here
    pub chat_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub business: String,
    pub purpose: String,
    pub features: String,
    pub has_domain: bool,
    pub extra: String,
    pub wants_support: bool,
    pub status: OrderStatus,
    #[serde(default)]
    pub status_text: String,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn from_submission(submission: Submission, now: DateTime<Utc>) -> Self {
        let Submission {
            id,
            chat_id,
            username,
            name,
            phone,
            email,
            business,
            purpose,
            features,
            has_domain,
            extra,
            wants_support,
        } = submission;

        Self {
            id,
            created_at: now,
            created_display: calendar::display_timestamp(now),
            chat_id,
            username,
            name,
            phone,
            email,
            business,
            purpose,
            features,
            has_domain,
            extra,
            wants_support,
            status: OrderStatus::Pending,
            status_text: String::new(),
            updated_at: now,
        }
    }
}

/// Filter for listing and bulk deletion. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub statuses: Option<Vec<OrderStatus>>,
    pub created_before: Option<DateTime<Utc>>,
    pub chat_id: Option<String>,
}

impl OrderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = OrderStatus>) -> Self {
        Self {
            statuses: Some(statuses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn created_before(cutoff: DateTime<Utc>) -> Self {
        Self {
            created_before: Some(cutoff),
            ..Self::default()
        }
    }

    pub fn owned_by(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&order.status) {
                return false;
            }
        }
        if let Some(cutoff) = self.created_before {
            if order.created_at >= cutoff {
                return false;
            }
        }
        if let Some(chat_id) = &self.chat_id {
            if &order.chat_id != chat_id {
                return false;
            }
        }
        true
    }
}

/// Per-status order counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub priced: usize,
    pub completed: usize,
    pub rejected: usize,
}

impl OrderStats {
    pub fn record(&mut self, status: OrderStatus) {
        self.total += 1;
        match status {
            OrderStatus::Pending => self.pending += 1,
            OrderStatus::Priced => self.priced += 1,
            OrderStatus::Completed => self.completed += 1,
            OrderStatus::Rejected => self.rejected += 1,
        }
    }
}

impl<'a> FromIterator<&'a Order> for OrderStats {
    fn from_iter<I: IntoIterator<Item = &'a Order>>(iter: I) -> Self {
        let mut stats = OrderStats::default();
        for order in iter {
            stats.record(order.status);
        }
        stats
    }
}

#[cfg(test)]
pub(crate) fn sample_order(id: &str, chat_id: &str, created_at: DateTime<Utc>) -> Order {
    let id = OrderId::parse(id).expect("test order id");
    Order::from_submission(
        Submission {
            id,
            chat_id: chat_id.to_string(),
            username: Some("ali_r".to_string()),
            name: "Ali Rezaei".to_string(),
            phone: "09123456789".to_string(),
            email: String::new(),
            business: "شخصی".to_string(),
            purpose: "معرفی خدمات".to_string(),
            features: "گالری تصاویر".to_string(),
            has_domain: false,
            extra: String::new(),
            wants_support: true,
        },
        created_at,
    )
}
