// Errors for the pass-through endpoints. The webhook endpoint never uses
// these: it acknowledges everything with 200.

use crate::core::chat::ChatError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

fn status_for_chat_error(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Api { status, .. } if *status == 404 => StatusCode::NOT_FOUND,
        ChatError::Api { status, .. } if *status == 400 => StatusCode::BAD_REQUEST,
        ChatError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        ChatError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ChatError::Transport(_) | ChatError::Api { .. } | ChatError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Chat(e) => status_for_chat_error(e),
        };
        if status.is_server_error() {
            tracing::error!("Pass-through request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Reject empty or whitespace-only identifiers.
pub fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}
