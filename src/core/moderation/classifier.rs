// Event classifier - decides which kind of moderation event a webhook body is.
//
// Rules are checked in order and the first match wins:
//   1. authored by the system identity -> ignorable (we never react to our own notices)
//   2. `message.flagged` with a message id -> explicit flag
//   3. `message.new` with id + text, profane, not already flagged -> heuristic candidate
//   4. AI queue item recommending flag/remove with a message id -> AI queue recommendation
//   5. anything else -> ignorable
//
// Classification never fails. A body we cannot parse is just ignorable.

use super::flag_memory::FlagMemory;
use super::moderation_models::{
    IgnoreReason, ModerationEvent, RecommendedAction, WebhookPayload, EVENT_MESSAGE_FLAGGED,
    EVENT_MESSAGE_NEW,
};
use super::profanity;
use crate::core::chat::ChatMessage;

/// Treat empty strings the same as absent fields.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Classify a raw webhook body.
pub fn classify(body: &[u8], memory: &FlagMemory, system_user_id: &str) -> ModerationEvent {
    match serde_json::from_slice::<WebhookPayload>(body) {
        Ok(payload) => classify_payload(&payload, memory, system_user_id),
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Ignoring malformed webhook payload");
            ModerationEvent::Ignorable(IgnoreReason::MalformedPayload)
        }
    }
}

/// Classify an already-parsed payload.
pub fn classify_payload(
    payload: &WebhookPayload,
    memory: &FlagMemory,
    system_user_id: &str,
) -> ModerationEvent {
    let event_type = payload.event_type.as_deref().unwrap_or_default();
    let message = payload.message.as_ref();
    let message_id = message.and_then(|m| non_empty(m.id.as_deref()));

    // 1. Loop prevention
    if message.and_then(|m| m.author_id()) == Some(system_user_id) {
        return ModerationEvent::Ignorable(IgnoreReason::SystemAuthored);
    }

    let to_chat_message = |id: &str| {
        let message = message.cloned().unwrap_or_default();
        ChatMessage {
            id: id.to_string(),
            cid: non_empty(message.cid.as_deref()).map(str::to_string),
            author_id: non_empty(message.author_id()).map(str::to_string),
            text: message.text.clone(),
        }
    };

    // 2. Provider flagged it
    if event_type == EVENT_MESSAGE_FLAGGED {
        if let Some(id) = message_id {
            return ModerationEvent::ExplicitFlag(to_chat_message(id));
        }
    }

    // 3. Our own fallback check on new messages
    if event_type == EVENT_MESSAGE_NEW {
        let text = message.and_then(|m| m.text.as_deref());
        if let (Some(id), Some(text)) = (message_id, text) {
            if profanity::contains_profanity(text) && !memory.was_recently_flagged(id) {
                return ModerationEvent::HeuristicCandidate(to_chat_message(id));
            }
        }
    }

    // 4. AI moderation queue
    if let Some(item) = &payload.item {
        let action = item
            .recommended_action
            .as_deref()
            .map(RecommendedAction::parse);
        if let (Some(action), Some(id)) = (action, non_empty(item.message_id.as_deref())) {
            if action.warrants_notice() {
                return ModerationEvent::AiQueueRecommendation {
                    message_id: id.to_string(),
                    action,
                };
            }
        }
    }

    // 5. Nothing to do; say why for the logs
    let missing_field = match event_type {
        EVENT_MESSAGE_FLAGGED => message_id.is_none(),
        EVENT_MESSAGE_NEW => {
            message_id.is_none() || message.and_then(|m| m.text.as_deref()).is_none()
        }
        _ => payload.item.as_ref().is_some_and(|item| {
            non_empty(item.message_id.as_deref()).is_none()
                && item
                    .recommended_action
                    .as_deref()
                    .is_some_and(|a| RecommendedAction::parse(a).warrants_notice())
        }),
    };

    if missing_field {
        tracing::warn!(event_type, "Webhook event missing a required field");
        ModerationEvent::Ignorable(IgnoreReason::MissingRequiredField)
    } else {
        ModerationEvent::Ignorable(IgnoreReason::Unhandled)
    }
}
