// Chat backend port and the thin pass-through service built on it.
//
// The relay treats the hosted chat provider as an external collaborator.
// Everything here either defines the contract the infra layer implements,
// or forwards a request straight through it (token minting, channel setup,
// manual flags, the debug injector).

use super::chat_models::{
    ChannelRef, ChannelTypePolicy, ChatMessage, ChatUser, MessageKind, OutgoingMessage,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Text posted by the debug injector. Contains a token the heuristic matches.
pub const PROFANE_TEST_MESSAGE: &str = "this is a shit test message from the debug route";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ChatError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("Chat backend unreachable: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("Chat backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The backend answered, but not with something we could read.
    #[error("Failed to decode chat backend response: {0}")]
    Decode(String),

    /// Signing a server or user token failed.
    #[error("Failed to sign token: {0}")]
    Token(String),

    /// An identifier that cannot stand as a single URL path segment.
    #[error("Identifier is not addressable: {0:?}")]
    InvalidPath(String),
}

impl ChatError {
    /// Whether the same call could succeed if attempted again later.
    ///
    /// Nothing retries today; callers log this so operators can tell a flaky
    /// backend from a request that will never work.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Transport(_) => true,
            ChatError::Api { status, .. } => *status == 429 || *status >= 500,
            ChatError::Decode(_) | ChatError::Token(_) | ChatError::InvalidPath(_) => false,
        }
    }

    /// The backend rejected an argument (unknown blocklist name and the like).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ChatError::Api { status: 400, .. })
    }
}

// ============================================================================
// BACKEND TRAIT (PORT)
// ============================================================================

/// Operations the relay needs from the hosted chat provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sign a client token for `user_id`. Purely local, no I/O.
    fn create_token(&self, user_id: &str) -> Result<String, ChatError>;

    async fn upsert_users(&self, users: &[ChatUser]) -> Result<(), ChatError>;

    /// Create the channel if missing and make sure `members` belong to it.
    async fn ensure_channel(
        &self,
        channel: &ChannelRef,
        created_by: &str,
        members: &[String],
    ) -> Result<(), ChatError>;

    /// Register a moderation flag on a message on behalf of `user_id`.
    async fn flag_message(&self, message_id: &str, user_id: &str) -> Result<(), ChatError>;

    async fn get_message(&self, message_id: &str) -> Result<ChatMessage, ChatError>;

    async fn update_channel_type(
        &self,
        channel_type: &str,
        policy: &ChannelTypePolicy,
    ) -> Result<(), ChatError>;

    async fn get_channel_type(&self, channel_type: &str) -> Result<ChannelTypePolicy, ChatError>;

    async fn send_message(
        &self,
        channel: &ChannelRef,
        message: &OutgoingMessage,
    ) -> Result<(), ChatError>;
}

// Lets the moderation and pass-through services share one client.
#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    fn create_token(&self, user_id: &str) -> Result<String, ChatError> {
        (**self).create_token(user_id)
    }

    async fn upsert_users(&self, users: &[ChatUser]) -> Result<(), ChatError> {
        (**self).upsert_users(users).await
    }

    async fn ensure_channel(
        &self,
        channel: &ChannelRef,
        created_by: &str,
        members: &[String],
    ) -> Result<(), ChatError> {
        (**self).ensure_channel(channel, created_by, members).await
    }

    async fn flag_message(&self, message_id: &str, user_id: &str) -> Result<(), ChatError> {
        (**self).flag_message(message_id, user_id).await
    }

    async fn get_message(&self, message_id: &str) -> Result<ChatMessage, ChatError> {
        (**self).get_message(message_id).await
    }

    async fn update_channel_type(
        &self,
        channel_type: &str,
        policy: &ChannelTypePolicy,
    ) -> Result<(), ChatError> {
        (**self).update_channel_type(channel_type, policy).await
    }

    async fn get_channel_type(&self, channel_type: &str) -> Result<ChannelTypePolicy, ChatError> {
        (**self).get_channel_type(channel_type).await
    }

    async fn send_message(
        &self,
        channel: &ChannelRef,
        message: &OutgoingMessage,
    ) -> Result<(), ChatError> {
        (**self).send_message(channel, message).await
    }
}

// ============================================================================
// PASS-THROUGH SERVICE
// ============================================================================

/// Token issued to a client application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub user_id: String,
    pub token: String,
}

pub struct ChatService<B: ChatBackend> {
    backend: B,
}

impl<B: ChatBackend> ChatService<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Make sure the user exists on the backend, then sign a token for them.
    pub async fn issue_token(
        &self,
        user_id: &str,
        name: Option<String>,
    ) -> Result<IssuedToken, ChatError> {
        let user = ChatUser {
            id: user_id.to_string(),
            name,
            role: None,
        };
        self.backend.upsert_users(std::slice::from_ref(&user)).await?;
        let token = self.backend.create_token(user_id)?;
        tracing::info!(user_id, "Issued chat token");

        Ok(IssuedToken {
            user_id: user_id.to_string(),
            token,
        })
    }

    pub async fn ensure_channel(
        &self,
        channel: &ChannelRef,
        created_by: &str,
        members: &[String],
    ) -> Result<(), ChatError> {
        self.backend
            .ensure_channel(channel, created_by, members)
            .await?;
        tracing::info!(cid = %channel, members = members.len(), "Channel ensured");
        Ok(())
    }

    /// Forward a user's report on a message.
    pub async fn flag_message(&self, message_id: &str, user_id: &str) -> Result<(), ChatError> {
        self.backend.flag_message(message_id, user_id).await?;
        tracing::info!(message_id, user_id, "Manual flag forwarded");
        Ok(())
    }

    /// Post a message the profanity heuristic will catch, as `user_id`.
    pub async fn send_profane_test(
        &self,
        channel: &ChannelRef,
        user_id: &str,
    ) -> Result<(), ChatError> {
        let message = OutgoingMessage {
            text: PROFANE_TEST_MESSAGE.to_string(),
            kind: MessageKind::Regular,
            user_id: user_id.to_string(),
        };
        self.backend.send_message(channel, &message).await?;
        tracing::warn!(cid = %channel, user_id, "Injected profane debug message");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
