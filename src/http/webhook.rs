// Webhook receiver for chat backend events.
//
// The provider retries, and eventually disables, webhooks that answer slowly
// or with an error status. So this handler classifies the body inline, hands
// anything actionable to a background task, and always answers 200 at once.

use super::AppState;
use crate::core::moderation::ModerationEvent;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::StatusCode,
};
use std::sync::Arc;

pub const ACK_OK: &str = "ok";
pub const ACK_IGNORED: &str = "ignored";

/// Largest webhook body read into memory. Anything bigger is acked as ignored.
pub const MAX_WEBHOOK_BYTES: usize = 8 * 1024 * 1024;

/// Accepts any content type; the provider does not always send `application/json`.
///
/// The body is read here rather than through the `Bytes` extractor, whose
/// rejection would answer 413 instead of an ack.
pub async fn receive(State(state): State<AppState>, body: Body) -> (StatusCode, &'static str) {
    let body = match to_bytes(body, MAX_WEBHOOK_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(limit = MAX_WEBHOOK_BYTES, "Webhook body unreadable or too large: {}", e);
            return (StatusCode::OK, ACK_IGNORED);
        }
    };

    let event = state.moderation.classify(&body);

    if let ModerationEvent::Ignorable(reason) = &event {
        tracing::debug!(%reason, "Webhook event ignored");
        return (StatusCode::OK, ACK_IGNORED);
    }

    tracing::debug!(kind = event.kind(), "Webhook event accepted");
    let moderation = Arc::clone(&state.moderation);
    tokio::spawn(async move {
        moderation.handle_event(event).await;
    });

    (StatusCode::OK, ACK_OK)
}
