//! Chat/vision completion client
//!
//! Speaks the Anthropic messages wire format: content is a list of typed
//! blocks, image blocks carry base64 data, and an assistant turn at the end
//! of the request primes the start of the reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ServiceConfig;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Model response contained no text")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: &'static str,
    pub media_type: String,
    pub data: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Base64-encoded image block
    pub fn image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource {
                source_type: "base64",
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    /// Assistant primer: forces the reply to continue from the given text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

/// Completion service seam
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;
}

/// HTTP client for the `/messages` completion endpoint
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct WireResponse {
    content: Vec<WireBlock>,
}

#[derive(Deserialize)]
struct WireBlock {
    #[serde(default)]
    text: Option<String>,
}

impl HttpModelClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.model_base_url.trim_end_matches('/').to_string(),
            api_key: config.model_api_key.clone(),
            model_id: config.model_id.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpModelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let url = format!("{}/messages", self.base_url);
        let wire = WireRequest {
            model: &self.model_id,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&wire)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WireResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .find_map(|b| b.text)
            .ok_or(ModelError::EmptyResponse)?;

        debug!(chars = text.len(), "received completion");
        Ok(text)
    }
}
