//! Upstream chat-completion client
//!
//! Issues the streaming chat-completion request and hands the response body
//! to a [`StreamDecoder`]. The upstream expects the conversation encoded as
//! a JSON string inside the request body rather than a plain array.

use serde::{Deserialize, Serialize};
use tracing::debug;

use chat_core::Message;

use crate::config::DecoderConfig;
use crate::decoder::{ResponseReader, StreamDecoder};
use crate::error::{Result, StreamError};

const CHAT_STREAM_SUFFIX: &str = "/chat/conversation";

/// One message in the upstream wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub content: String,
    pub role: String,
    #[serde(rename = "isSensitive")]
    pub is_sensitive: bool,
    #[serde(rename = "needCheck")]
    pub need_check: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            role: message.role.as_str().to_string(),
            is_sensitive: false,
            need_check: true,
            id: None,
        }
    }
}

/// Body of the streaming chat-completion POST. The `messages` field carries
/// the JSON-encoded wire messages as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: String,
}

impl ChatCompletionRequest {
    pub fn from_messages(messages: &[Message]) -> Result<Self> {
        let wire: Vec<WireMessage> = messages.iter().map(WireMessage::from).collect();
        Ok(Self {
            messages: serde_json::to_string(&wire)?,
        })
    }
}

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
    decoder_config: DecoderConfig,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token: auth_token.into(),
            decoder_config: DecoderConfig::default(),
        }
    }

    pub fn with_decoder_config(mut self, config: DecoderConfig) -> Self {
        self.decoder_config = config;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Open the upstream stream and wrap it in a decoder. The returned
    /// decoder is owned by the calling task; drop the `recv()` future to
    /// abort an in-flight read.
    pub async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<StreamDecoder<ResponseReader>> {
        let url = format!("{}{}", self.base_url, CHAT_STREAM_SUFFIX);
        debug!(%url, "opening chat completion stream");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(request)
            .send()
            .await
            .map_err(StreamError::Http)?
            .error_for_status()
            .map_err(StreamError::Http)?;

        StreamDecoder::from_response(response, self.decoder_config.clone())
    }
}
