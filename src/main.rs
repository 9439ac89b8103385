// This is the entry point of the moderation relay.
//
// **Architecture Overview:**
// - `core/` = Business logic (classification, dedupe, notices)
// - `infra/` = Implementations of core traits (the chat backend REST client)
// - `http/` = HTTP adapters (webhook receiver, client pass-throughs)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Reconcile the backend's moderation policy
// 4. Serve HTTP

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "http/http_layer.rs"]
mod http;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::RelayConfig;
use crate::core::chat::ChatService;
use crate::core::moderation::{
    reconcile_policy, FlagMemory, ModerationConfig, ModerationService, PolicyOutcome,
};
use crate::http::{AppState, SharedBackend};
use crate::infra::stream::StreamChatClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // One chat client, one flag memory, shared by everything that needs them.

    let backend: SharedBackend = Arc::new(StreamChatClient::new(config.stream.clone())?);

    // Policy trouble is logged inside; we serve webhooks either way
    if let PolicyOutcome::Applied { blocklist } = reconcile_policy(&backend, &config.policy).await
    {
        tracing::info!(
            channel_type = %config.policy.channel_type,
            blocklist = %blocklist,
            "Moderation policy reconciled"
        );
    }

    let memory = Arc::new(FlagMemory::new(chrono::Duration::seconds(
        config.flag_ttl_secs,
    )));

    // Optional sweeper for expired entries nobody looks up again
    if let Some(interval) = config.sweep_interval {
        let memory = Arc::clone(&memory);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = memory.purge_expired();
                if removed > 0 {
                    tracing::debug!(
                        removed,
                        remaining = memory.len(),
                        "Purged expired flag memory entries"
                    );
                }
            }
        });
    }

    let moderation = Arc::new(ModerationService::new(
        Arc::clone(&backend),
        Arc::clone(&memory),
        ModerationConfig {
            system_user_id: config.system_user_id.clone(),
            preview_chars: config.preview_chars,
        },
    ));
    let chat = Arc::new(ChatService::new(Arc::clone(&backend)));

    let state = AppState {
        moderation,
        chat,
        api_key: config.stream.api_key.clone(),
        system_user_id: config.system_user_id.clone(),
        channel_type: config.policy.channel_type.clone(),
        debug_routes: config.debug_routes,
    };

    tracing::info!(
        system_user = %config.system_user_id,
        flag_ttl_secs = config.flag_ttl_secs,
        sweep = ?config.sweep_interval,
        "Moderation relay starting"
    );

    http::serve(state, config.bind_addr).await
}
