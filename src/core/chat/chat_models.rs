// Chat domain models - the shapes the relay exchanges with the chat backend.
//
// These are independent of any HTTP client. The infra layer converts the
// provider's JSON into these, and the moderation core only ever sees these.

use serde::{Deserialize, Serialize};

/// A message as resolved from the chat backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    /// Composite conversation id, `"<type>:<id>"`.
    pub cid: Option<String>,
    pub author_id: Option<String>,
    pub text: Option<String>,
}

/// A channel handle, derived from a composite conversation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelRef {
    pub channel_type: String,
    pub channel_id: String,
}

impl ChannelRef {
    pub fn new(channel_type: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            channel_type: channel_type.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Split a composite conversation id on its first `:`.
    ///
    /// Returns `None` when there is no separator or either half is empty.
    /// Anything after the first `:` belongs to the channel id, so
    /// `"team:a:b"` addresses channel `a:b` of type `team`.
    pub fn parse(cid: &str) -> Option<Self> {
        let (channel_type, channel_id) = cid.split_once(':')?;
        if channel_type.is_empty() || channel_id.is_empty() {
            return None;
        }
        Some(Self::new(channel_type, channel_id))
    }

    pub fn cid(&self) -> String {
        format!("{}:{}", self.channel_type, self.channel_id)
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel_type, self.channel_id)
    }
}

/// Kind of message to post. Notices are always `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Regular,
    System,
}

/// Outbound message body for `send_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub kind: MessageKind,
    pub user_id: String,
}

/// User record for `upsert_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// How the backend reacts when a blocklisted term is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlocklistBehavior {
    /// Store the message and attach a flag for review.
    Flag,
    /// Reject the message outright.
    Block,
}

/// Channel-type level moderation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTypePolicy {
    pub blocklist: Option<String>,
    pub blocklist_behavior: Option<BlocklistBehavior>,
}
