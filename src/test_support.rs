//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::attachment::Attachment;
use crate::core::state::App;
use crate::core::storage::MemoryStorage;
use crate::inference::{CompletionProvider, CompletionRequest, Message, ProviderError, WireMessage};

/// A provider that plays back queued outcomes, then repeats a default reply.
/// Every request it sees is recorded as `(model, messages)`.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    default_reply: String,
    requests: Mutex<Vec<(String, Vec<WireMessage>)>>,
}

impl ScriptedProvider {
    /// Always answers `reply`.
    pub fn replying(reply: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails once with `error`, then answers "ok".
    pub fn failing(error: ProviderError) -> Self {
        Self::replying("ok").then(Err(error))
    }

    /// Queues one more outcome ahead of the default reply.
    pub fn then(self, outcome: Result<String, ProviderError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn requests(&self) -> Vec<(String, Vec<WireMessage>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Message, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.model.to_string(), request.messages.to_vec()));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome.map(Message::assistant),
            None => Ok(Message::assistant(self.default_reply.clone())),
        }
    }
}

/// Creates a test App with in-memory storage and a provider answering "ok".
pub fn test_app() -> App {
    test_app_with(ScriptedProvider::replying("ok"))
}

/// Creates a test App around the given provider.
pub fn test_app_with(provider: impl Into<Arc<ScriptedProvider>>) -> App {
    let provider: Arc<ScriptedProvider> = provider.into();
    App::new(provider, Arc::new(MemoryStorage::new()))
}

/// A small PNG-typed attachment with a fake data URL.
pub fn image_attachment(name: &str) -> Attachment {
    Attachment {
        name: name.to_string(),
        mime_type: "image/png".to_string(),
        payload: "data:image/png;base64,iVBORw0KGgo=".to_string(),
    }
}
