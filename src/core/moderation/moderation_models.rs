// Moderation domain models - what comes in from the webhook and what the
// dispatcher decided to do with it.
//
// The raw payload types mirror the provider's JSON loosely: every field is
// optional, because a missing field is a classification outcome here, not a
// parse error.

use crate::core::chat::ChatMessage;
use serde::Deserialize;

/// Provider event type for a message the backend itself flagged.
pub const EVENT_MESSAGE_FLAGGED: &str = "message.flagged";
/// Provider event type for a newly posted message.
pub const EVENT_MESSAGE_NEW: &str = "message.new";

// ============================================================================
// RAW WEBHOOK PAYLOAD
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub message: Option<WebhookMessage>,
    #[serde(default)]
    pub item: Option<WebhookQueueItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub user: Option<WebhookUser>,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookMessage {
    pub fn author_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookUser {
    #[serde(default)]
    pub id: Option<String>,
}

/// An entry from the provider's AI moderation review queue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQueueItem {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub recommended_action: Option<String>,
}

// ============================================================================
// CLASSIFIED EVENTS
// ============================================================================

/// What the AI moderation queue suggests doing with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendedAction {
    Flag,
    Remove,
    Other(String),
}

impl RecommendedAction {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flag" => RecommendedAction::Flag,
            "remove" => RecommendedAction::Remove,
            other => RecommendedAction::Other(other.to_string()),
        }
    }

    /// Only flag and remove recommendations warrant a notice.
    pub fn warrants_notice(&self) -> bool {
        matches!(self, RecommendedAction::Flag | RecommendedAction::Remove)
    }
}

/// Why an event was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Body was not valid JSON for the webhook shape
    MalformedPayload,
    /// A shape we know, but without the field we need
    MissingRequiredField,
    /// Authored by the relay itself
    SystemAuthored,
    /// Nothing moderation-worthy
    Unhandled,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::MalformedPayload => write!(f, "malformed payload"),
            IgnoreReason::MissingRequiredField => write!(f, "missing required field"),
            IgnoreReason::SystemAuthored => write!(f, "system authored"),
            IgnoreReason::Unhandled => write!(f, "unhandled"),
        }
    }
}

/// A classified inbound webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationEvent {
    /// The backend flagged the message itself
    ExplicitFlag(ChatMessage),
    /// New message that our own profanity check caught
    HeuristicCandidate(ChatMessage),
    /// AI queue recommendation; only the message id is known
    AiQueueRecommendation {
        message_id: String,
        action: RecommendedAction,
    },
    Ignorable(IgnoreReason),
}

impl ModerationEvent {
    #[allow(dead_code)]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, ModerationEvent::Ignorable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModerationEvent::ExplicitFlag(_) => "explicit_flag",
            ModerationEvent::HeuristicCandidate(_) => "heuristic_candidate",
            ModerationEvent::AiQueueRecommendation { .. } => "ai_queue_recommendation",
            ModerationEvent::Ignorable(_) => "ignorable",
        }
    }
}

// ============================================================================
// DISPATCH OUTCOMES
// ============================================================================

/// Why a dispatch stopped before delivering anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Ignored(IgnoreReason),
    MissingMessageId,
    MissingConversation,
    /// Conversation id has no `type:id` split
    UnaddressableConversation(String),
    /// AI queue lookup failed
    ResolveFailed,
    SystemAuthored,
}

/// What happened to one event. Logged and returned for tests, never sent
/// back to the webhook caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { message_id: String, cid: String },
    /// Another event already produced a notice for this message
    Duplicate { message_id: String },
    Skipped(SkipReason),
    /// The message id stays claimed; a later duplicate will not retry.
    DeliveryFailed { message_id: String },
}

impl DispatchOutcome {
    #[allow(dead_code)]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}
