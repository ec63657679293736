//! Order persistence
//!
//! Two interchangeable backends sit behind the `Database` handle: a JSON Lines
//! append log with an in-memory index (default, human-inspectable) and an
//! embedded SQLite table.

mod log;
pub mod schema;
mod sqlite;

pub use log::OrderLog;
pub use schema::*;
pub use sqlite::SqliteOrders;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Order log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Order log encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),
    #[error("Order {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Order store lock poisoned")]
    Poisoned,
    #[error("Blocking store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type DbResult<T> = Result<T, DbError>;

/// Which backend a `Database` opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Log,
    Sqlite,
}

enum Store {
    Log(OrderLog),
    Sqlite(SqliteOrders),
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    store: Arc<Store>,
}

impl Database {
    /// Open or create the order store at the given path
    pub fn open<P: AsRef<Path>>(backend: Backend, path: P) -> DbResult<Self> {
        let store = match backend {
            Backend::Log => Store::Log(OrderLog::open(path)?),
            Backend::Sqlite => Store::Sqlite(SqliteOrders::open(path)?),
        };
        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// Open an in-memory SQLite store (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            store: Arc::new(Store::Sqlite(SqliteOrders::open_in_memory()?)),
        })
    }

    /// Insert a new order. Fails with `DuplicateOrder` if the id exists.
    pub fn append(&self, order: &Order) -> DbResult<()> {
        match self.store.as_ref() {
            Store::Log(log) => log.append(order),
            Store::Sqlite(db) => db.append(order),
        }
    }

    pub fn get(&self, id: &OrderId) -> DbResult<Option<Order>> {
        match self.store.as_ref() {
            Store::Log(log) => log.get(id),
            Store::Sqlite(db) => db.get(id),
        }
    }

    /// Matching orders, oldest first
    pub fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        match self.store.as_ref() {
            Store::Log(log) => log.list(filter),
            Store::Sqlite(db) => db.list(filter),
        }
    }

    /// Move an order to `status`, enforcing the forward-only lifecycle
    pub fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        status_text: &str,
    ) -> DbResult<Order> {
        match self.store.as_ref() {
            Store::Log(log) => log.update_status(id, status, status_text),
            Store::Sqlite(db) => db.update_status(id, status, status_text),
        }
    }

    /// Remove every matching order; returns how many were removed
    pub fn delete_matching(&self, filter: &OrderFilter) -> DbResult<usize> {
        match self.store.as_ref() {
            Store::Log(log) => log.delete_matching(filter),
            Store::Sqlite(db) => db.delete_matching(filter),
        }
    }

    pub fn stats(&self) -> DbResult<OrderStats> {
        let orders = self.list(&OrderFilter::all())?;
        Ok(orders.iter().collect())
    }
}

/// Shared status check used by both backends
pub(crate) fn check_transition(order: &Order, to: OrderStatus) -> DbResult<()> {
    if order.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(DbError::InvalidTransition {
            id: order.id.clone(),
            from: order.status,
            to,
        })
    }
}
