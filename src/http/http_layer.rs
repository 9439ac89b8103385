// HTTP layer - the webhook receiver and the client-facing pass-throughs.

#[path = "endpoints.rs"]
pub mod endpoints;
#[path = "error.rs"]
pub mod error;
#[path = "webhook.rs"]
pub mod webhook;

use crate::core::chat::{ChatBackend, ChatService};
use crate::core::moderation::ModerationService;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

/// One chat client shared by every service.
pub type SharedBackend = Arc<dyn ChatBackend>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub moderation: Arc<ModerationService<SharedBackend>>,
    pub chat: Arc<ChatService<SharedBackend>>,
    /// Public API key, returned alongside client tokens
    pub api_key: String,
    pub system_user_id: String,
    /// Channel type used when a request does not name one
    pub channel_type: String,
    pub debug_routes: bool,
}

pub fn app_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/webhooks/stream", post(webhook::receive))
        .route("/token", post(endpoints::issue_token))
        .route("/channels/ensure", post(endpoints::ensure_channel))
        .route("/moderation/flag", post(endpoints::flag_message));

    if state.debug_routes {
        tracing::warn!("Debug routes enabled: POST /debug/profane is live");
        router = router.route("/debug/profane", post(endpoints::send_profane_test));
    }

    router.with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = app_router(state);

    tracing::info!("Moderation relay listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
