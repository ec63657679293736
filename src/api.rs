//! HTTP surface: Telegram webhook and health check

mod handlers;
mod types;

pub use handlers::create_router;

use crate::dispatch::Dispatcher;
use crate::runtime::{DatabaseStorage, InMemorySessions};
use crate::telegram::TelegramClient;
use std::sync::Arc;

pub type ProductionDispatcher = Dispatcher<InMemorySessions, DatabaseStorage, TelegramClient>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ProductionDispatcher>,
    /// Required value of the secret token header, when configured
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(dispatcher: ProductionDispatcher, webhook_secret: Option<String>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }
}
