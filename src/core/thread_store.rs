//! # Thread Store
//!
//! Owns every persisted conversation. The whole collection lives in memory,
//! newest first, and is written to storage under one key as a full JSON
//! snapshot after every mutation.
//!
//! Loading happens once, at construction. A missing value is an empty
//! collection. An unparsable value is also an empty collection: the failure
//! is logged and kept in [`ThreadStore::load_warning`], never fatal.
//!
//! A failed snapshot write is logged and the in-memory collection stays
//! authoritative; the next successful write catches storage up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::storage::Storage;
use crate::inference::{Message, Role};

pub const THREADS_KEY: &str = "threads";
pub const TITLE_MAX_CHARS: usize = 30;
pub const FALLBACK_TITLE: &str = "File/Image Chat";

/// A persisted conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThreadStoreError {
    #[error("thread {0} not found")]
    ThreadNotFound(String),
}

/// Generate a new UUID v4 thread ID.
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Derive a title from typed text: trimmed, at most 30 characters.
/// Blank text gets the fallback literal.
pub fn derive_title(seed: &str) -> String {
    let trimmed = seed.trim();
    if trimmed.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}

/// Typed text of the first user message, if any.
fn title_seed(messages: &[Message]) -> &str {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.display_text.as_deref())
        .unwrap_or("")
}

pub struct ThreadStore {
    storage: Arc<dyn Storage>,
    threads: Vec<Thread>,
    load_warning: Option<String>,
}

impl ThreadStore {
    /// Loads the collection from storage.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let mut load_warning = None;
        let threads = match storage.get(THREADS_KEY) {
            Ok(None) => Vec::new(),
            Ok(Some(json)) => match serde_json::from_str::<Vec<Thread>>(&json) {
                Ok(threads) => {
                    info!("Loaded {} thread(s)", threads.len());
                    threads
                }
                Err(e) => {
                    warn!("Stored threads are unreadable, starting empty: {}", e);
                    load_warning = Some(format!("stored threads could not be parsed: {e}"));
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read stored threads, starting empty: {}", e);
                load_warning = Some(format!("stored threads could not be read: {e}"));
                Vec::new()
            }
        };

        Self {
            storage,
            threads,
            load_warning,
        }
    }

    /// Why the initial load fell back to an empty collection, if it did.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    /// All threads, newest first.
    pub fn all(&self) -> &[Thread] {
        &self.threads
    }

    pub fn get(&self, id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Creates a thread from its first exchange.
    pub fn create(
        &mut self,
        first_user: Message,
        first_assistant: Message,
        title_seed: &str,
    ) -> &Thread {
        self.create_from_history(vec![first_user, first_assistant], title_seed)
    }

    /// Creates a thread from everything a draft accumulated (failed
    /// exchanges included) and inserts it at the front.
    pub fn create_from_history(&mut self, messages: Vec<Message>, title_seed: &str) -> &Thread {
        let thread = Thread {
            id: new_thread_id(),
            title: derive_title(title_seed),
            messages,
            created_at: Utc::now(),
        };
        info!(
            "Created thread {} ('{}', {} messages)",
            thread.id,
            thread.title,
            thread.messages.len()
        );
        self.threads.insert(0, thread);
        self.persist();
        &self.threads[0]
    }

    /// Creates a thread titled after its first user message.
    pub fn create_titled_from_history(&mut self, messages: Vec<Message>) -> &Thread {
        let seed = title_seed(&messages).to_string();
        self.create_from_history(messages, &seed)
    }

    /// Appends one exchange (user, then assistant).
    pub fn append_exchange(
        &mut self,
        thread_id: &str,
        user: Message,
        assistant: Message,
    ) -> Result<(), ThreadStoreError> {
        self.append_messages(thread_id, vec![user, assistant])
    }

    /// Appends messages in order. Existing messages are never touched.
    pub fn append_messages(
        &mut self,
        thread_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), ThreadStoreError> {
        let thread = self
            .threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| ThreadStoreError::ThreadNotFound(thread_id.to_string()))?;
        debug!("Appending {} message(s) to thread {}", messages.len(), thread_id);
        thread.messages.extend(messages);
        self.persist();
        Ok(())
    }

    /// Deletes a thread. Returns the removed thread, if it existed.
    pub fn remove(&mut self, thread_id: &str) -> Option<Thread> {
        let index = self.threads.iter().position(|t| t.id == thread_id)?;
        let removed = self.threads.remove(index);
        info!("Deleted thread {}", thread_id);
        self.persist();
        Some(removed)
    }

    /// Writes the full collection snapshot.
    fn persist(&self) {
        let json = match serde_json::to_string(&self.threads) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize threads: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(THREADS_KEY, &json) {
            warn!("Failed to persist threads: {}", e);
        }
    }
}
