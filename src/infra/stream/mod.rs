pub mod stream_client;

pub use stream_client::{StreamChatClient, StreamConfig, DEFAULT_BASE_URL};
