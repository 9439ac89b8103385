// The infra module contains implementations of core traits.
// Each backend implementation goes in its own submodule.

#[path = "stream/mod.rs"]
pub mod stream;
