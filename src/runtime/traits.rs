//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{
    Database, DbResult, Order, OrderFilter, OrderId, OrderStats, OrderStatus,
};
use crate::state_machine::effect::Keyboard;
use crate::state_machine::Session;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
}

/// Presentation options for an outbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyOptions {
    pub keyboard: Option<Keyboard>,
    /// Edit this message instead of sending a new one
    pub edit_of: Option<String>,
}

/// Per-identity conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, SessionError>;

    async fn put(&self, user_id: &str, session: Session) -> Result<(), SessionError>;

    async fn delete(&self, user_id: &str) -> Result<(), SessionError>;

    /// Replace the session only if it still equals `expected`.
    /// `next == None` removes it. Returns `false` when another writer got there first.
    async fn compare_and_swap(
        &self,
        user_id: &str,
        expected: Option<&Session>,
        next: Option<Session>,
    ) -> Result<bool, SessionError>;
}

/// Durable order storage
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn append(&self, order: &Order) -> DbResult<()>;

    async fn get(&self, id: &OrderId) -> DbResult<Option<Order>>;

    async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>>;

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        status_text: &str,
    ) -> DbResult<Order>;

    async fn delete_matching(&self, filter: &OrderFilter) -> DbResult<usize>;

    async fn stats(&self) -> DbResult<OrderStats>;
}

/// Outbound message transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipient: &str,
        content: &str,
        options: &NotifyOptions,
    ) -> Result<(), NotifyError>;

    /// Best-effort display handle for a user
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, NotifyError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, SessionError> {
        (**self).get(user_id).await
    }

    async fn put(&self, user_id: &str, session: Session) -> Result<(), SessionError> {
        (**self).put(user_id, session).await
    }

    async fn delete(&self, user_id: &str) -> Result<(), SessionError> {
        (**self).delete(user_id).await
    }

    async fn compare_and_swap(
        &self,
        user_id: &str,
        expected: Option<&Session>,
        next: Option<Session>,
    ) -> Result<bool, SessionError> {
        (**self).compare_and_swap(user_id, expected, next).await
    }
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn append(&self, order: &Order) -> DbResult<()> {
        (**self).append(order).await
    }

    async fn get(&self, id: &OrderId) -> DbResult<Option<Order>> {
        (**self).get(id).await
    }

    async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        (**self).list(filter).await
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        status_text: &str,
    ) -> DbResult<Order> {
        (**self).update_status(id, status, status_text).await
    }

    async fn delete_matching(&self, filter: &OrderFilter) -> DbResult<usize> {
        (**self).delete_matching(filter).await
    }

    async fn stats(&self) -> DbResult<OrderStats> {
        (**self).stats().await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(
        &self,
        recipient: &str,
        content: &str,
        options: &NotifyOptions,
    ) -> Result<(), NotifyError> {
        (**self).notify(recipient, content, options).await
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, NotifyError> {
        (**self).display_name(user_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use `Database` as `OrderStore`.
///
/// Store calls fsync, so they run on the blocking pool.
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<T, F>(&self, op: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db)).await?
    }
}

#[async_trait]
impl OrderStore for DatabaseStorage {
    async fn append(&self, order: &Order) -> DbResult<()> {
        let order = order.clone();
        self.blocking(move |db| db.append(&order)).await
    }

    async fn get(&self, id: &OrderId) -> DbResult<Option<Order>> {
        let id = id.clone();
        self.blocking(move |db| db.get(&id)).await
    }

    async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let filter = filter.clone();
        self.blocking(move |db| db.list(&filter)).await
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        status_text: &str,
    ) -> DbResult<Order> {
        let id = id.clone();
        let status_text = status_text.to_string();
        self.blocking(move |db| db.update_status(&id, status, &status_text))
            .await
    }

    async fn delete_matching(&self, filter: &OrderFilter) -> DbResult<usize> {
        let filter = filter.clone();
        self.blocking(move |db| db.delete_matching(&filter)).await
    }

    async fn stats(&self) -> DbResult<OrderStats> {
        self.blocking(Database::stats).await
    }
}
