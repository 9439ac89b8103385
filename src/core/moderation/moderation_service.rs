// Moderation service - turns classified webhook events into moderation notices.
//
// This service handles:
// - Dedupe via the shared flag memory (one notice per message per window)
// - Resolving AI queue items to full messages
// - Registering heuristic hits as real flags on the backend
// - Composing the redacted notice and posting it into the conversation
//
// Every collaborator failure stops at this layer. The webhook caller never
// learns whether a notice went out.

use super::classifier;
use super::flag_memory::FlagMemory;
use super::moderation_models::{DispatchOutcome, ModerationEvent, RecommendedAction, SkipReason};
use super::profanity;
use crate::core::chat::{ChannelRef, ChatBackend, ChatMessage, MessageKind, OutgoingMessage};
use std::sync::Arc;

/// Longest preview of the offending text included in a notice, in characters.
pub const NOTICE_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// Author id for every notice. Events from this id are never acted on.
    pub system_user_id: String,
    pub preview_chars: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            system_user_id: "moderation-bot".to_string(),
            preview_chars: NOTICE_PREVIEW_CHARS,
        }
    }
}

/// Redact first, then cap, so a cut can never expose part of a token.
pub fn notice_preview(text: Option<&str>, max_chars: usize) -> String {
    let redacted = profanity::redact(text.unwrap_or_default().trim());
    if redacted.chars().count() <= max_chars {
        return redacted;
    }
    let mut preview: String = redacted.chars().take(max_chars.saturating_sub(1)).collect();
    preview.push('…');
    preview
}

pub struct ModerationService<B: ChatBackend> {
    backend: B,
    memory: Arc<FlagMemory>,
    config: ModerationConfig,
}

impl<B: ChatBackend> ModerationService<B> {
    pub fn new(backend: B, memory: Arc<FlagMemory>, config: ModerationConfig) -> Self {
        Self {
            backend,
            memory,
            config,
        }
    }

    #[cfg(test)]
    pub fn memory(&self) -> &Arc<FlagMemory> {
        &self.memory
    }

    /// Classify a raw webhook body against this service's memory and identity.
    pub fn classify(&self, body: &[u8]) -> ModerationEvent {
        classifier::classify(body, &self.memory, &self.config.system_user_id)
    }

    /// Run one classified event to completion.
    pub async fn handle_event(&self, event: ModerationEvent) -> DispatchOutcome {
        let kind = event.kind();
        let outcome = match event {
            ModerationEvent::Ignorable(reason) => {
                DispatchOutcome::Skipped(SkipReason::Ignored(reason))
            }
            ModerationEvent::ExplicitFlag(message) => self.dispatch(&message).await,
            ModerationEvent::HeuristicCandidate(message) => {
                self.dispatch_heuristic(&message).await
            }
            ModerationEvent::AiQueueRecommendation { message_id, action } => {
                self.dispatch_queue_item(&message_id, &action).await
            }
        };

        match &outcome {
            DispatchOutcome::Delivered { message_id, cid } => {
                tracing::info!(kind, message_id = %message_id, cid = %cid, "Moderation notice posted");
            }
            DispatchOutcome::Duplicate { message_id } => {
                tracing::debug!(kind, message_id = %message_id, "Notice already sent, skipping");
            }
            DispatchOutcome::Skipped(reason) => {
                tracing::debug!(kind, ?reason, "No notice for event");
            }
            DispatchOutcome::DeliveryFailed { message_id } => {
                tracing::debug!(kind, message_id = %message_id, "Notice lost, message stays claimed");
            }
        }

        outcome
    }

    /// Post a notice for a fully known message, at most once per window.
    pub async fn dispatch(&self, message: &ChatMessage) -> DispatchOutcome {
        match self.claim(message) {
            Ok(channel) => self.deliver_notice(message, &channel).await,
            Err(outcome) => outcome,
        }
    }

    /// Heuristic hits also get registered as a real flag on the backend.
    async fn dispatch_heuristic(&self, message: &ChatMessage) -> DispatchOutcome {
        let channel = match self.claim(message) {
            Ok(channel) => channel,
            Err(outcome) => return outcome,
        };

        if let Err(e) = self
            .backend
            .flag_message(&message.id, &self.config.system_user_id)
            .await
        {
            tracing::warn!(
                message_id = %message.id,
                retryable = e.is_retryable(),
                "Failed to register heuristic flag, posting notice anyway: {}",
                e
            );
        }

        self.deliver_notice(message, &channel).await
    }

    /// AI queue items only carry an id; fetch the message before dispatching.
    async fn dispatch_queue_item(
        &self,
        message_id: &str,
        action: &RecommendedAction,
    ) -> DispatchOutcome {
        let mut message = match self.backend.get_message(message_id).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    message_id,
                    ?action,
                    retryable = e.is_retryable(),
                    "Failed to resolve AI queue message: {}",
                    e
                );
                return DispatchOutcome::Skipped(SkipReason::ResolveFailed);
            }
        };

        if message.id.is_empty() {
            message.id = message_id.to_string();
        }

        self.dispatch(&message).await
    }

    /// Validate the message and take the dedupe slot for it.
    ///
    /// Runs before any I/O for the message, so an overlapping event for the
    /// same id sees the claim and backs off.
    fn claim(&self, message: &ChatMessage) -> Result<ChannelRef, DispatchOutcome> {
        if message.id.trim().is_empty() {
            return Err(DispatchOutcome::Skipped(SkipReason::MissingMessageId));
        }
        if message.author_id.as_deref() == Some(self.config.system_user_id.as_str()) {
            return Err(DispatchOutcome::Skipped(SkipReason::SystemAuthored));
        }
        let cid = match message.cid.as_deref() {
            Some(cid) if !cid.is_empty() => cid,
            _ => return Err(DispatchOutcome::Skipped(SkipReason::MissingConversation)),
        };
        let channel = match ChannelRef::parse(cid) {
            Some(channel) => channel,
            None => {
                tracing::warn!(message_id = %message.id, cid, "Cannot address conversation id");
                return Err(DispatchOutcome::Skipped(
                    SkipReason::UnaddressableConversation(cid.to_string()),
                ));
            }
        };

        if !self.memory.claim(&message.id) {
            return Err(DispatchOutcome::Duplicate {
                message_id: message.id.clone(),
            });
        }

        Ok(channel)
    }

    pub fn compose_notice(&self, message: &ChatMessage) -> String {
        let author = message.author_id.as_deref().unwrap_or("unknown user");
        let preview = notice_preview(message.text.as_deref(), self.config.preview_chars);
        format!("⚠️ A message from @{author} was flagged for moderator review: \"{preview}\"")
    }

    async fn deliver_notice(&self, message: &ChatMessage, channel: &ChannelRef) -> DispatchOutcome {
        let notice = OutgoingMessage {
            text: self.compose_notice(message),
            kind: MessageKind::System,
            user_id: self.config.system_user_id.clone(),
        };

        match self.backend.send_message(channel, &notice).await {
            Ok(()) => DispatchOutcome::Delivered {
                message_id: message.id.clone(),
                cid: channel.cid(),
            },
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    cid = %channel,
                    retryable = e.is_retryable(),
                    "Failed to post moderation notice: {}",
                    e
                );
                DispatchOutcome::DeliveryFailed {
                    message_id: message.id.clone(),
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat::mock::MockChatBackend;
    use crate::core::moderation::flag_memory::{Clock, ManualClock, DEFAULT_FLAG_TTL_SECS};
    use crate::core::moderation::moderation_models::IgnoreReason;
    use chrono::Duration;
    use serde_json::json;

    const SYSTEM: &str = "moderation-bot";

    fn service() -> (
        ModerationService<Arc<MockChatBackend>>,
        Arc<MockChatBackend>,
        Arc<ManualClock>,
    ) {
        let backend = Arc::new(MockChatBackend::new());
        let clock = Arc::new(ManualClock::new());
        let memory = Arc::new(FlagMemory::with_clock(
            Duration::seconds(DEFAULT_FLAG_TTL_SECS),
            clock.clone() as Arc<dyn Clock>,
        ));
        let service = ModerationService::new(
            Arc::clone(&backend),
            memory,
            ModerationConfig::default(),
        );
        (service, backend, clock)
    }

    fn message(id: &str, author: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            cid: Some("messaging:general".to_string()),
            author_id: Some(author.to_string()),
            text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_flag_event_posts_redacted_system_notice() {
        let (service, backend, _) = service();
        let body = json!({
            "type": "message.flagged",
            "message": {"id": "m1", "cid": "messaging:general", "user": {"id": "alice"}, "text": "you fuck"}
        })
        .to_string();

        let event = service.classify(body.as_bytes());
        let outcome = service.handle_event(event).await;

        assert!(outcome.is_delivered());
        let sent = backend.sent_messages();
        assert_eq!(sent.len(), 1);
        let (channel, notice) = &sent[0];
        assert_eq!(channel, &ChannelRef::new("messaging", "general"));
        assert_eq!(notice.kind, MessageKind::System);
        assert_eq!(notice.user_id, SYSTEM);
        assert!(notice.text.contains("f***"));
        assert!(notice.text.contains("@alice"));
        assert!(!notice.text.contains("fuck"));
    }

    #[tokio::test]
    async fn test_clean_new_message_posts_nothing() {
        let (service, backend, _) = service();
        let body = json!({
            "type": "message.new",
            "message": {"id": "m2", "cid": "messaging:general", "user": {"id": "bob"}, "text": "hello friend"}
        })
        .to_string();

        let outcome = service.handle_event(service.classify(body.as_bytes())).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped(SkipReason::Ignored(IgnoreReason::Unhandled))
        );
        assert!(backend.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_immediate_repeat_dispatch_posts_once() {
        let (service, backend, _) = service();
        let msg = message("m1", "alice", "you fuck");

        assert!(service.dispatch(&msg).await.is_delivered());
        assert_eq!(
            service.dispatch(&msg).await,
            DispatchOutcome::Duplicate {
                message_id: "m1".into()
            }
        );
        assert_eq!(backend.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_after_ttl_posts_again() {
        let (service, backend, clock) = service();
        let msg = message("m1", "alice", "you fuck");

        assert!(service.dispatch(&msg).await.is_delivered());
        clock.advance(Duration::seconds(DEFAULT_FLAG_TTL_SECS + 1));
        assert!(service.dispatch(&msg).await.is_delivered());

        assert_eq!(backend.sent_messages().len(), 2);
    }

    #[tokio::test]
    async fn test_racing_flag_and_heuristic_events_post_once() {
        let (service, backend, _) = service();
        backend.set_send_delay(std::time::Duration::from_millis(20));
        let msg = message("m3", "carol", "total bullshit");

        let (a, b) = tokio::join!(
            service.handle_event(ModerationEvent::ExplicitFlag(msg.clone())),
            service.handle_event(ModerationEvent::HeuristicCandidate(msg.clone())),
        );

        assert_eq!([&a, &b].iter().filter(|o| o.is_delivered()).count(), 1);
        assert_eq!(backend.sent_messages().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_post_once() {
        let (service, backend, _) = service();
        backend.set_send_delay(std::time::Duration::from_millis(5));
        let service = Arc::new(service);
        let msg = message("m3", "carol", "shit");

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = Arc::clone(&service);
            let event = if i % 2 == 0 {
                ModerationEvent::ExplicitFlag(msg.clone())
            } else {
                ModerationEvent::HeuristicCandidate(msg.clone())
            };
            handles.push(tokio::spawn(async move { service.handle_event(event).await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(backend.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_heuristic_registers_flag_before_notice() {
        let (service, backend, _) = service();
        let msg = message("m7", "dave", "you bastard");

        let outcome = service
            .handle_event(ModerationEvent::HeuristicCandidate(msg))
            .await;

        assert!(outcome.is_delivered());
        assert_eq!(backend.flagged(), vec![("m7".to_string(), SYSTEM.to_string())]);
        assert!(backend.sent_messages()[0].1.text.contains("b***"));
    }

    #[tokio::test]
    async fn test_failed_flag_registration_still_posts_notice() {
        let (service, backend, _) = service();
        backend.fail_flags();

        let outcome = service
            .handle_event(ModerationEvent::HeuristicCandidate(message("m8", "erin", "shit")))
            .await;

        assert!(outcome.is_delivered());
        assert!(backend.flagged().is_empty());
        assert_eq!(backend.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_retried_by_duplicates() {
        let (service, backend, _) = service();
        backend.fail_sends();
        let msg = message("m1", "alice", "fuck");

        assert_eq!(
            service.dispatch(&msg).await,
            DispatchOutcome::DeliveryFailed {
                message_id: "m1".into()
            }
        );
        assert!(matches!(
            service.dispatch(&msg).await,
            DispatchOutcome::Duplicate { .. }
        ));
        assert!(backend.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_ai_queue_item_resolves_then_posts() {
        let (service, backend, _) = service();
        backend.insert_message(message("m4", "frank", "what a dick"));
        let body = json!({"item": {"message_id": "m4", "recommended_action": "remove"}}).to_string();

        let outcome = service.handle_event(service.classify(body.as_bytes())).await;

        assert!(outcome.is_delivered());
        assert!(backend.sent_messages()[0].1.text.contains("d***"));
    }

    #[tokio::test]
    async fn test_ai_queue_item_from_system_identity_posts_nothing() {
        let (service, backend, _) = service();
        backend.insert_message(message("m4", SYSTEM, "⚠️ earlier notice"));

        let outcome = service
            .handle_event(ModerationEvent::AiQueueRecommendation {
                message_id: "m4".into(),
                action: RecommendedAction::Remove,
            })
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::SystemAuthored));
        assert!(backend.sent_messages().is_empty());
        // A skipped message must not block a later legitimate notice
        assert!(!service.memory().was_recently_flagged("m4"));
    }

    #[tokio::test]
    async fn test_ai_queue_item_that_cannot_be_resolved_is_skipped() {
        let (service, backend, _) = service();

        let outcome = service
            .handle_event(ModerationEvent::AiQueueRecommendation {
                message_id: "missing".into(),
                action: RecommendedAction::Flag,
            })
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::ResolveFailed));
        assert!(backend.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_missing_or_bad_conversation_is_skipped_without_claiming() {
        let (service, backend, _) = service();

        let mut no_cid = message("m5", "gina", "shit");
        no_cid.cid = None;
        assert_eq!(
            service.dispatch(&no_cid).await,
            DispatchOutcome::Skipped(SkipReason::MissingConversation)
        );

        let mut bad_cid = message("m6", "gina", "shit");
        bad_cid.cid = Some("general".into());
        assert_eq!(
            service.dispatch(&bad_cid).await,
            DispatchOutcome::Skipped(SkipReason::UnaddressableConversation("general".into()))
        );

        assert!(backend.sent_messages().is_empty());
        assert!(service.memory().is_empty());
    }

    #[test]
    fn test_preview_is_redacted_and_capped() {
        let long = format!("{} fuck", "a".repeat(200));
        let preview = notice_preview(Some(&long), NOTICE_PREVIEW_CHARS);
        assert_eq!(preview.chars().count(), NOTICE_PREVIEW_CHARS);
        assert!(preview.ends_with('…'));

        // The token sits right at the cut: it must be masked before truncating
        let edge = format!("{}fuck you", "a ".repeat(58));
        let preview = notice_preview(Some(&edge), NOTICE_PREVIEW_CHARS);
        assert!(!preview.contains("fuc"));

        assert_eq!(notice_preview(None, NOTICE_PREVIEW_CHARS), "");
        assert_eq!(notice_preview(Some("hello"), NOTICE_PREVIEW_CHARS), "hello");
    }

    #[test]
    fn test_notice_without_author_names_unknown_user() {
        let (service, _, _) = service();
        let mut msg = message("m1", "x", "shit");
        msg.author_id = None;
        assert!(service.compose_notice(&msg).contains("@unknown user"));
    }
}
