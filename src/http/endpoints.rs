// Thin endpoints for client applications. Each one validates its input and
// forwards to the chat backend; there is no moderation logic here.

use super::error::{require, ApiError};
use super::AppState;
use crate::core::chat::ChannelRef;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub api_key: String,
    pub user_id: String,
}

pub async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    require("user_id", &req.user_id)?;

    let issued = state.chat.issue_token(req.user_id.trim(), req.name).await?;
    Ok(Json(TokenResponse {
        token: issued.token,
        api_key: state.api_key.clone(),
        user_id: issued.user_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EnsureChannelRequest {
    #[serde(default)]
    pub channel_type: Option<String>,
    pub channel_id: String,
    pub created_by: String,
    #[serde(default)]
    pub members: Vec<String>,
}

pub async fn ensure_channel(
    State(state): State<AppState>,
    Json(req): Json<EnsureChannelRequest>,
) -> Result<Json<Value>, ApiError> {
    require("channel_id", &req.channel_id)?;
    require("created_by", &req.created_by)?;

    let channel = ChannelRef::new(
        req.channel_type
            .unwrap_or_else(|| state.channel_type.clone()),
        req.channel_id,
    );

    // The creator is always a member of what they create
    let mut members = req.members;
    if !members.contains(&req.created_by) {
        members.push(req.created_by.clone());
    }

    state
        .chat
        .ensure_channel(&channel, &req.created_by, &members)
        .await?;
    Ok(Json(json!({ "cid": channel.cid() })))
}

#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub message_id: String,
    pub user_id: String,
}

pub async fn flag_message(
    State(state): State<AppState>,
    Json(req): Json<FlagRequest>,
) -> Result<Json<Value>, ApiError> {
    require("message_id", &req.message_id)?;
    require("user_id", &req.user_id)?;

    state.chat.flag_message(&req.message_id, &req.user_id).await?;
    Ok(Json(json!({ "flagged": true })))
}

#[derive(Debug, Deserialize)]
pub struct ProfaneTestRequest {
    #[serde(default)]
    pub channel_type: Option<String>,
    pub channel_id: String,
    pub user_id: String,
}

/// Only routed when debug routes are enabled.
pub async fn send_profane_test(
    State(state): State<AppState>,
    Json(req): Json<ProfaneTestRequest>,
) -> Result<Json<Value>, ApiError> {
    require("channel_id", &req.channel_id)?;
    require("user_id", &req.user_id)?;
    if req.user_id == state.system_user_id {
        // The relay ignores its own messages, so this would test nothing
        return Err(ApiError::BadRequest(
            "user_id must not be the system identity".to_string(),
        ));
    }

    let channel = ChannelRef::new(
        req.channel_type
            .unwrap_or_else(|| state.channel_type.clone()),
        req.channel_id,
    );
    state.chat.send_profane_test(&channel, &req.user_id).await?;
    Ok(Json(json!({ "sent": true, "cid": channel.cid() })))
}
