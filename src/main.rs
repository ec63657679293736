//! Site intake bot
//!
//! A Telegram bot that interviews customers about the website they want,
//! files the result as an order and lets one administrator quote, reject and
//! complete orders.

mod api;
mod calendar;
mod config;
mod db;
mod dispatch;
mod messages;
mod runtime;
mod state_machine;
mod telegram;
mod validate;

use api::{create_router, AppState};
use config::BotConfig;
use db::Database;
use dispatch::Dispatcher;
use runtime::{DatabaseStorage, InMemorySessions, ProductionRuntime};
use std::net::SocketAddr;
use telegram::TelegramClient;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "site_intake=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;

    // Ensure data directory exists
    if let Some(parent) = config.data_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.data_path.display(), backend = ?config.backend, "Opening order store");
    let db = Database::open(config.backend, &config.data_path)?;
    let stats = db.stats()?;
    tracing::info!(total = stats.total, pending = stats.pending, "Order store ready");

    let telegram = TelegramClient::new(&config.api_base, &config.bot_token)?;
    if let Some(url) = &config.webhook_url {
        telegram
            .set_webhook(url, config.webhook_secret.as_deref())
            .await?;
        tracing::info!(%url, "Webhook registered");
    }

    let runtime = ProductionRuntime::new(
        config.admin_chat_id.clone(),
        InMemorySessions::new(),
        DatabaseStorage::new(db),
        telegram,
    );
    let state = AppState::new(Dispatcher::new(runtime), config.webhook_secret.clone());

    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, admin = %config.admin_chat_id, "Site intake bot listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
