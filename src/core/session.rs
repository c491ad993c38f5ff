//! # Session State Machine
//!
//! ```text
//!            startNewChat / deleteThread(active)
//!        ┌──────────────────────────────────────────┐
//!        ▼                                          │
//!     Draft ──dispatch ok: create()──► Active(id) ──┤
//!        │                               ▲   │      │
//!        └──────selectThread(id)─────────┘   └──dispatch ok: append(id)
//! ```
//!
//! `Draft` means no thread id exists yet; one is assigned only when the
//! first successful reply is persisted. The reducer in `action.rs` is the
//! only writer of the session pointer.

use crate::core::thread_store::{ThreadStore, ThreadStoreError};
use crate::inference::Message;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Authoring a conversation that has not been persisted yet.
    #[default]
    Draft,
    /// Continuing the persisted thread with this id.
    Active(String),
}

impl SessionState {
    pub fn active_id(&self) -> Option<&str> {
        match self {
            SessionState::Draft => None,
            SessionState::Active(id) => Some(id),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, SessionState::Draft)
    }

    pub fn is_active(&self, thread_id: &str) -> bool {
        self.active_id() == Some(thread_id)
    }

    /// Persists a successful exchange (plus any unpersisted messages before
    /// it) and returns the state the session moves to.
    ///
    /// Draft creates a thread and becomes `Active(new_id)`; `Active(id)`
    /// appends and stays put.
    pub fn commit(
        &self,
        store: &mut ThreadStore,
        messages: Vec<Message>,
    ) -> Result<SessionState, ThreadStoreError> {
        match self {
            SessionState::Draft => {
                let thread = store.create_titled_from_history(messages);
                Ok(SessionState::Active(thread.id.clone()))
            }
            SessionState::Active(id) => {
                store.append_messages(id, messages)?;
                Ok(self.clone())
            }
        }
    }
}
