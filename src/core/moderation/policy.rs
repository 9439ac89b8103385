// Startup reconciliation of the channel type's moderation policy.
//
// We want the provider to flag (never hard-block) messages hitting the
// configured blocklist. If the provider does not know that blocklist we fall
// back to its built-in one, once. Nothing here is allowed to stop the relay
// from serving webhooks.

use crate::core::chat::{BlocklistBehavior, ChannelTypePolicy, ChatBackend, ChatError};

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub channel_type: String,
    pub blocklist: String,
    pub fallback_blocklist: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            channel_type: "messaging".to_string(),
            blocklist: "profanity_en".to_string(),
            fallback_blocklist: "profanity_en_2020_v1".to_string(),
        }
    }
}

/// How reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Policy applied with this blocklist name
    Applied { blocklist: String },
    /// Nothing could be applied; the backend keeps its previous policy
    Failed,
}

fn flag_policy(blocklist: &str) -> ChannelTypePolicy {
    ChannelTypePolicy {
        blocklist: Some(blocklist.to_string()),
        blocklist_behavior: Some(BlocklistBehavior::Flag),
    }
}

/// Apply the flag-on-blocklist policy, falling back once on an invalid name.
pub async fn reconcile_policy<B: ChatBackend>(backend: &B, config: &PolicyConfig) -> PolicyOutcome {
    let outcome = match apply(backend, config).await {
        Ok(blocklist) => PolicyOutcome::Applied { blocklist },
        Err(e) => {
            tracing::error!(
                channel_type = %config.channel_type,
                retryable = e.is_retryable(),
                "Failed to reconcile moderation policy, continuing with backend defaults: {}",
                e
            );
            PolicyOutcome::Failed
        }
    };

    match backend.get_channel_type(&config.channel_type).await {
        Ok(effective) => tracing::info!(
            channel_type = %config.channel_type,
            blocklist = ?effective.blocklist,
            behavior = ?effective.blocklist_behavior,
            "Effective moderation policy"
        ),
        Err(e) => tracing::warn!(
            channel_type = %config.channel_type,
            "Could not read back moderation policy: {}",
            e
        ),
    }

    outcome
}

async fn apply<B: ChatBackend>(backend: &B, config: &PolicyConfig) -> Result<String, ChatError> {
    match backend
        .update_channel_type(&config.channel_type, &flag_policy(&config.blocklist))
        .await
    {
        Ok(()) => Ok(config.blocklist.clone()),
        Err(e) if e.is_invalid_argument() && config.fallback_blocklist != config.blocklist => {
            tracing::warn!(
                blocklist = %config.blocklist,
                fallback = %config.fallback_blocklist,
                "Blocklist rejected, retrying with fallback: {}",
                e
            );
            backend
                .update_channel_type(
                    &config.channel_type,
                    &flag_policy(&config.fallback_blocklist),
                )
                .await?;
            Ok(config.fallback_blocklist.clone())
        }
        Err(e) => Err(e),
    }
}
