//! OpenRouter provider implementation using the Chat Completions API.
//!
//! One request per turn, no streaming: the body is `{model, messages}` and
//! the reply is read from `choices[0].message.content`. Anything else in the
//! response is ignored.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::inference::{
    CompletionProvider, CompletionRequest, Message, ProviderError, WireMessage,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

// ============================================================================
// Chat Completions API Types
// ============================================================================

/// The request body for the Chat Completions API
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
}

/// Only the path we read is modelled; every level is optional so a missing
/// field becomes `MalformedResponse` instead of a serde error.
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pulls the assistant reply out of a raw response body.
fn parse_reply(body: &str) -> Result<Message, ProviderError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(Message::assistant)
        .ok_or_else(|| {
            ProviderError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// OpenRouter API provider using Chat Completions
pub struct OpenRouterProvider {
    api_key: String,
    base_url: String,
    referer: String,
    title: String,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    /// Creates a new OpenRouter provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenRouter API key, sent as a bearer credential
    /// * `base_url` - Optional custom base URL (defaults to OpenRouter's API)
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            referer: crate::core::config::DEFAULT_REFERER.to_string(),
            title: crate::core::config::DEFAULT_APP_TITLE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Sets the `HTTP-Referer` and `X-Title` attribution headers.
    pub fn with_attribution(mut self, referer: String, title: String) -> Self {
        self.referer = referer;
        self.title = title;
        self
    }

    /// Sends a request to the completions endpoint and returns the raw body.
    async fn send_request(&self, request: &ChatRequest<'_>) -> Result<String, ProviderError> {
        let json_body = serde_json::to_string(request)
            .map_err(|e| ProviderError::Config(format!("Request serialization failed: {e}")))?;
        debug!("OpenRouter request body: {} bytes", json_body.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .body(json_body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        debug!("OpenRouter response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("OpenRouter API error: {} - {}", status, err_body);
            return Err(ProviderError::Api {
                status,
                message: err_body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Config("missing API key".to_string()));
        }

        let chat_request = ChatRequest {
            model: request.model,
            messages: request.messages,
        };

        info!(
            "OpenRouter chat request: model={}, message_count={}",
            request.model,
            request.messages.len()
        );

        let body = self.send_request(&chat_request).await?;
        let reply = parse_reply(&body);
        if let Err(e) = &reply {
            warn!("Could not parse completion: {}", e);
        }
        reply
    }
}
