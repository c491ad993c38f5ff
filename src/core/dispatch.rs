//! # Completion Dispatcher
//!
//! Sends one composed payload and returns one assistant message.
//!
//! Single-flight: a dispatch needs an [`InFlight`] ticket, and only one
//! ticket exists at a time. The ticket clears the busy flag when dropped, so
//! the flag is released on every exit path (success, parse failure, network
//! failure, or a panicking task). There are no retries and no timeout.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::inference::{
    CompletionProvider, CompletionRequest, Message, ModelDescriptor, ProviderError, WireMessage,
};

pub const NETWORK_ERROR_REPLY: &str = "Error: Could not connect to the API.";
pub const MALFORMED_REPLY: &str = "Error: The API returned an unexpected response.";

/// Proof that the caller holds the busy flag.
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!("Dispatch ticket released");
    }
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InFlight")
    }
}

pub struct Dispatcher {
    provider: Arc<dyn CompletionProvider>,
    busy: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Checks and sets the busy flag in one step.
    /// Returns `None` while another dispatch holds the ticket.
    pub fn try_begin(&self) -> Option<InFlight> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Sends `{model, messages}` and parses the first choice.
    pub async fn dispatch(
        &self,
        _ticket: &InFlight,
        payload: &[WireMessage],
        model: &ModelDescriptor,
    ) -> Result<Message, ProviderError> {
        info!(
            "Dispatching {} message(s) to {} via {}",
            payload.len(),
            model.id,
            self.provider.name()
        );
        let request = CompletionRequest {
            messages: payload,
            model: &model.id,
        };
        let result = self.provider.complete(request).await;
        if let Err(e) = &result {
            warn!("Dispatch failed: {}", e);
        }
        result
    }
}

/// The synthetic assistant message shown in place of a reply.
pub fn failure_message(error: &ProviderError) -> Message {
    if error.is_malformed() {
        Message::assistant(MALFORMED_REPLY)
    } else {
        Message::assistant(NETWORK_ERROR_REPLY)
    }
}
