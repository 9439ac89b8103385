// Runtime configuration, read from the environment (and `.env`, loaded in main).

use crate::core::moderation::{PolicyConfig, NOTICE_PREVIEW_CHARS};
use crate::infra::stream::{StreamConfig, DEFAULT_BASE_URL};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub stream: StreamConfig,
    pub system_user_id: String,
    pub policy: PolicyConfig,
    pub flag_ttl_secs: i64,
    /// Run a periodic purge of expired flag memory entries. `None` keeps
    /// eviction purely lazy.
    pub sweep_interval: Option<Duration>,
    pub preview_chars: usize,
    pub debug_routes: bool,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let bind = or_default("RELAY_BIND", "0.0.0.0:8080");
        let bind_addr = bind.parse().map_err(|_| ConfigError::Invalid {
            key: "RELAY_BIND",
            value: bind.clone(),
        })?;

        let timeout_secs = parse_number(&get, "STREAM_TIMEOUT_SECS", 10u64)?;
        let flag_ttl_secs = parse_number(&get, "FLAG_MEMORY_TTL_SECS", 300i64)?;
        if flag_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "FLAG_MEMORY_TTL_SECS",
                value: flag_ttl_secs.to_string(),
            });
        }
        let sweep_secs = parse_number(&get, "FLAG_MEMORY_SWEEP_SECS", 0u64)?;

        let policy_defaults = PolicyConfig::default();

        Ok(Self {
            bind_addr,
            stream: StreamConfig {
                api_key: required("STREAM_API_KEY")?,
                api_secret: required("STREAM_API_SECRET")?,
                base_url: or_default("STREAM_BASE_URL", DEFAULT_BASE_URL),
                timeout: Duration::from_secs(timeout_secs),
            },
            system_user_id: or_default("MODERATION_SYSTEM_USER", "moderation-bot"),
            policy: PolicyConfig {
                channel_type: or_default("MODERATION_CHANNEL_TYPE", &policy_defaults.channel_type),
                blocklist: or_default("MODERATION_BLOCKLIST", &policy_defaults.blocklist),
                fallback_blocklist: or_default(
                    "MODERATION_FALLBACK_BLOCKLIST",
                    &policy_defaults.fallback_blocklist,
                ),
            },
            flag_ttl_secs,
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            preview_chars: NOTICE_PREVIEW_CHARS,
            debug_routes: get("RELAY_DEBUG_ROUTES")
                .map(|v| {
                    matches!(
                        v.trim().to_ascii_lowercase().as_str(),
                        "1" | "true" | "on" | "yes"
                    )
                })
                .unwrap_or(false),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
