//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, Update, WebhookResponse};
use super::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

/// Accept one update and process it in the background.
///
/// Telegram redelivers on non-2xx, so anything past authentication is
/// acknowledged even if the bot ignores it.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Result<Json<WebhookResponse>, AppError> {
    if !secret_matches(state.webhook_secret.as_deref(), &headers) {
        tracing::warn!(update_id = update.update_id, "Webhook call with bad secret token");
        return Err(AppError::Unauthorized);
    }

    let update_id = update.update_id;
    let callback_id = update.callback_id().map(str::to_string);
    let Some(inbound) = update.into_inbound() else {
        tracing::debug!(update_id, "Ignoring update");
        return Ok(Json(WebhookResponse { ok: true }));
    };

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        if let Some(id) = callback_id {
            if let Err(e) = dispatcher.runtime().notifier().answer_callback(&id).await {
                tracing::debug!(update_id, error = %e, "Failed to answer callback query");
            }
        }
        let sender_id = inbound.sender_id.clone();
        let outcome = dispatcher.dispatch(inbound).await;
        tracing::debug!(update_id, %sender_id, ?outcome, "Update handled");
    });

    Ok(Json(WebhookResponse { ok: true }))
}

fn secret_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|given| given == expected)
}

// ============================================================
// Health
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_version() -> &'static str {
    concat!("site-intake ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid secret token"),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
