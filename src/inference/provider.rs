use async_trait::async_trait;
use thiserror::Error;

use super::types::{Message, WireMessage};

/// Errors that can occur during provider operations.
/// None of them are retried; the caller turns them into a visible reply.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider misconfigured (missing API key, bad URL).
    #[error("config error: {0}")]
    Config(String),
    /// Network-level failure (DNS, connection refused, body read failure).
    #[error("network error: {0}")]
    Network(String),
    /// API returned a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    /// The response had no `choices[0].message.content`.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// True when the failure is about the response body rather than getting one.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProviderError::MalformedResponse(_))
    }
}

/// Everything a provider needs to fulfill a completion request.
pub struct CompletionRequest<'a> {
    pub messages: &'a [WireMessage],
    pub model: &'a str,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Sends one completion request and parses exactly one assistant message
    /// out of the response.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, ProviderError>;
}
