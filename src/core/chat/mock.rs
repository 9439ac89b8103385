// In-memory chat backend for tests. Records every call and can be told to fail.

use super::chat_models::{ChannelRef, ChannelTypePolicy, ChatMessage, ChatUser, OutgoingMessage};
use super::chat_service::{ChatBackend, ChatError};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MockChatBackend {
    messages: DashMap<String, ChatMessage>,
    sent: Mutex<Vec<(ChannelRef, OutgoingMessage)>>,
    flags: Mutex<Vec<(String, String)>>,
    upserts: Mutex<Vec<ChatUser>>,
    channels: Mutex<Vec<(ChannelRef, String, Vec<String>)>>,
    policy_updates: Mutex<Vec<(String, ChannelTypePolicy)>>,
    policies: DashMap<String, ChannelTypePolicy>,
    rejected_blocklists: DashSet<String>,
    fail_sends: AtomicBool,
    fail_flags: AtomicBool,
    fail_upserts: AtomicBool,
    fail_policy_updates: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `get_message` return this message.
    pub fn insert_message(&self, message: ChatMessage) {
        self.messages.insert(message.id.clone(), message);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn fail_flags(&self) {
        self.fail_flags.store(true, Ordering::SeqCst);
    }

    pub fn fail_upserts(&self) {
        self.fail_upserts.store(true, Ordering::SeqCst);
    }

    /// Every channel type update fails with a 500.
    pub fn fail_policy_updates(&self) {
        self.fail_policy_updates.store(true, Ordering::SeqCst);
    }

    /// Answer 400 when a channel type update names this blocklist.
    pub fn reject_blocklist(&self, name: &str) {
        self.rejected_blocklists.insert(name.to_string());
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn sent_messages(&self) -> Vec<(ChannelRef, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn flagged(&self) -> Vec<(String, String)> {
        self.flags.lock().unwrap().clone()
    }

    pub fn upserted_users(&self) -> Vec<ChatUser> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn ensured_channels(&self) -> Vec<(ChannelRef, String, Vec<String>)> {
        self.channels.lock().unwrap().clone()
    }

    pub fn policy_updates(&self) -> Vec<(String, ChannelTypePolicy)> {
        self.policy_updates.lock().unwrap().clone()
    }
}

fn server_error() -> ChatError {
    ChatError::Api {
        status: 500,
        message: "mock failure".to_string(),
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    fn create_token(&self, user_id: &str) -> Result<String, ChatError> {
        Ok(format!("token-for-{user_id}"))
    }

    async fn upsert_users(&self, users: &[ChatUser]) -> Result<(), ChatError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        self.upserts.lock().unwrap().extend(users.iter().cloned());
        Ok(())
    }

    async fn ensure_channel(
        &self,
        channel: &ChannelRef,
        created_by: &str,
        members: &[String],
    ) -> Result<(), ChatError> {
        self.channels.lock().unwrap().push((
            channel.clone(),
            created_by.to_string(),
            members.to_vec(),
        ));
        Ok(())
    }

    async fn flag_message(&self, message_id: &str, user_id: &str) -> Result<(), ChatError> {
        if self.fail_flags.load(Ordering::SeqCst) {
            return Err(ChatError::Transport("connection reset".to_string()));
        }
        self.flags
            .lock()
            .unwrap()
            .push((message_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn get_message(&self, message_id: &str) -> Result<ChatMessage, ChatError> {
        self.messages
            .get(message_id)
            .map(|m| m.clone())
            .ok_or_else(|| ChatError::Api {
                status: 404,
                message: format!("message {message_id} not found"),
            })
    }

    async fn update_channel_type(
        &self,
        channel_type: &str,
        policy: &ChannelTypePolicy,
    ) -> Result<(), ChatError> {
        self.policy_updates
            .lock()
            .unwrap()
            .push((channel_type.to_string(), policy.clone()));

        if self.fail_policy_updates.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        if let Some(name) = &policy.blocklist {
            if self.rejected_blocklists.contains(name) {
                return Err(ChatError::Api {
                    status: 400,
                    message: format!("blocklist {name} does not exist"),
                });
            }
        }
        self.policies
            .insert(channel_type.to_string(), policy.clone());
        Ok(())
    }

    async fn get_channel_type(&self, channel_type: &str) -> Result<ChannelTypePolicy, ChatError> {
        Ok(self
            .policies
            .get(channel_type)
            .map(|p| p.clone())
            .unwrap_or(ChannelTypePolicy {
                blocklist: None,
                blocklist_behavior: None,
            }))
    }

    async fn send_message(
        &self,
        channel: &ChannelRef,
        message: &OutgoingMessage,
    ) -> Result<(), ChatError> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.clone(), message.clone()));
        Ok(())
    }
}
