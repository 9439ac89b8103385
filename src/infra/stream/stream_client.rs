// Stream-style REST client: the production `ChatBackend`.
//
// Ids that reach this client come from unauthenticated webhook bodies, so
// every path is assembled segment by segment and each id is percent-encoded
// into exactly one segment.

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::chat::{
    BlocklistBehavior, ChannelRef, ChannelTypePolicy, ChatBackend, ChatError, ChatMessage,
    ChatUser, OutgoingMessage,
};

pub const DEFAULT_BASE_URL: &str = "https://chat.stream-io-api.com";

/// Connection settings for the hosted chat API.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// REST client for the hosted chat backend. Server calls are authenticated
/// with a short HS256 token signed by the API secret; client tokens are
/// signed the same way and never leave this process except through `/token`.
pub struct StreamChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    encoding_key: EncodingKey,
}

#[derive(Serialize)]
struct ServerClaims {
    server: bool,
}

#[derive(Serialize)]
struct UserClaims<'a> {
    user_id: &'a str,
}

impl StreamChatClient {
    pub fn new(config: StreamConfig) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert("stream-auth-type", HeaderValue::from_static("jwt"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("ModerationRelay/0.2"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            encoding_key: EncodingKey::from_secret(config.api_secret.as_bytes()),
        })
    }

    fn server_token(&self) -> Result<String, ChatError> {
        encode(
            &Header::default(),
            &ServerClaims { server: true },
            &self.encoding_key,
        )
        .map_err(|e| ChatError::Token(e.to_string()))
    }

    /// Base URL plus `segments`, each encoded as one path segment.
    ///
    /// Empty, `.` and `..` segments are refused: the URL parser would drop or
    /// resolve them and the request would land on a different endpoint.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ChatError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(ChatError::InvalidPath(bad.to_string()));
        }

        let mut url =
            Url::parse(&self.base_url).map_err(|e| ChatError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                ChatError::Transport(format!("base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<Value, ChatError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let mut request = self
            .client
            .request(method.clone(), url)
            .query(&[("api_key", self.api_key.as_str())])
            .header(AUTHORIZATION, self.server_token()?);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::debug!(%method, %path, status = status.as_u16(), "Chat backend call failed");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))
    }
}

/// Pull the human-readable message out of an error body, if there is one.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string())
}

fn map_message(api: ApiMessage) -> ChatMessage {
    ChatMessage {
        id: api.id.unwrap_or_default(),
        cid: api.cid,
        author_id: api.user.and_then(|u| u.id),
        text: api.text,
    }
}

fn parse_behavior(raw: Option<&str>) -> Option<BlocklistBehavior> {
    match raw {
        Some("flag") => Some(BlocklistBehavior::Flag),
        Some("block") => Some(BlocklistBehavior::Block),
        _ => None,
    }
}

#[async_trait]
impl ChatBackend for StreamChatClient {
    fn create_token(&self, user_id: &str) -> Result<String, ChatError> {
        encode(&Header::default(), &UserClaims { user_id }, &self.encoding_key)
            .map_err(|e| ChatError::Token(e.to_string()))
    }

    async fn upsert_users(&self, users: &[ChatUser]) -> Result<(), ChatError> {
        let by_id: serde_json::Map<String, Value> = users
            .iter()
            .map(|u| (u.id.clone(), json!(u)))
            .collect();
        self.request(Method::POST, &["users"], Some(json!({ "users": by_id })))
            .await?;
        Ok(())
    }

    async fn ensure_channel(
        &self,
        channel: &ChannelRef,
        created_by: &str,
        members: &[String],
    ) -> Result<(), ChatError> {
        let path = [
            "channels",
            channel.channel_type.as_str(),
            channel.channel_id.as_str(),
            "query",
        ];
        let body = json!({
            "data": { "created_by_id": created_by, "members": members },
        });
        self.request(Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    async fn flag_message(&self, message_id: &str, user_id: &str) -> Result<(), ChatError> {
        let body = json!({ "target_message_id": message_id, "user_id": user_id });
        self.request(Method::POST, &["moderation", "flag"], Some(body))
            .await?;
        Ok(())
    }

    async fn get_message(&self, message_id: &str) -> Result<ChatMessage, ChatError> {
        let value = self
            .request(Method::GET, &["messages", message_id], None)
            .await?;
        let envelope: ApiMessageEnvelope =
            serde_json::from_value(value).map_err(|e| ChatError::Decode(e.to_string()))?;
        envelope
            .message
            .map(map_message)
            .ok_or_else(|| ChatError::Decode("response has no message".to_string()))
    }

    async fn update_channel_type(
        &self,
        channel_type: &str,
        policy: &ChannelTypePolicy,
    ) -> Result<(), ChatError> {
        let mut body = serde_json::Map::new();
        if let Some(blocklist) = &policy.blocklist {
            body.insert("blocklist".to_string(), json!(blocklist));
        }
        if let Some(behavior) = policy.blocklist_behavior {
            body.insert("blocklist_behavior".to_string(), json!(behavior));
        }
        self.request(
            Method::PUT,
            &["channeltypes", channel_type],
            Some(Value::Object(body)),
        )
        .await?;
        Ok(())
    }

    async fn get_channel_type(&self, channel_type: &str) -> Result<ChannelTypePolicy, ChatError> {
        let value = self
            .request(Method::GET, &["channeltypes", channel_type], None)
            .await?;
        let api: ApiChannelType =
            serde_json::from_value(value).map_err(|e| ChatError::Decode(e.to_string()))?;
        Ok(ChannelTypePolicy {
            blocklist: api.blocklist,
            blocklist_behavior: parse_behavior(api.blocklist_behavior.as_deref()),
        })
    }

    async fn send_message(
        &self,
        channel: &ChannelRef,
        message: &OutgoingMessage,
    ) -> Result<(), ChatError> {
        let path = [
            "channels",
            channel.channel_type.as_str(),
            channel.channel_id.as_str(),
            "message",
        ];
        let body = json!({
            "message": {
                "text": message.text,
                "type": message.kind,
                "user_id": message.user_id,
            },
        });
        self.request(Method::POST, &path, Some(body)).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessageEnvelope {
    message: Option<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: Option<String>,
    cid: Option<String>,
    user: Option<ApiUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChannelType {
    blocklist: Option<String>,
    blocklist_behavior: Option<String>,
}
