// Core moderation module - decides when a moderation notice goes out.
// Following the same pattern as the chat module.

pub mod classifier;
pub mod flag_memory;
pub mod moderation_models;
pub mod moderation_service;
pub mod policy;
pub mod profanity;

pub use flag_memory::FlagMemory;
pub use moderation_models::*;
pub use moderation_service::*;
pub use policy::{reconcile_policy, PolicyConfig, PolicyOutcome};
