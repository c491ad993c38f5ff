//! # Application State
//!
//! Core business state for Susu. Domain logic only; nothing here knows how
//! the conversation is displayed.
//!
//! ```text
//! App
//! ├── dispatcher: Arc<Dispatcher>     // provider + single-flight flag
//! ├── threads: ThreadStore            // persisted conversations
//! ├── session: SessionState           // Draft | Active(thread id)
//! ├── messages: Vec<Message>          // conversation currently in view
//! ├── persisted_len: usize            // prefix of `messages` already stored
//! ├── attachments: AttachmentStore    // files for the next message
//! ├── models: Vec<ModelDescriptor>    // catalog
//! ├── selected_model: usize           // index into `models`
//! ├── generation: u64                 // bumped whenever the view is replaced
//! └── status_message: String          // status line text
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.

use std::sync::Arc;

use crate::core::attachment::{AttachmentStore, DEFAULT_MAX_ATTACHMENT_BYTES};
use crate::core::config::ResolvedConfig;
use crate::core::dispatch::Dispatcher;
use crate::core::session::SessionState;
use crate::core::storage::Storage;
use crate::core::thread_store::ThreadStore;
use crate::inference::{CompletionProvider, Message, ModelDescriptor, default_models};

pub struct App {
    pub dispatcher: Arc<Dispatcher>,
    pub threads: ThreadStore,
    pub session: SessionState,
    pub messages: Vec<Message>,
    pub persisted_len: usize,
    pub attachments: AttachmentStore,
    pub models: Vec<ModelDescriptor>,
    pub selected_model: usize,
    pub generation: u64,
    pub max_attachment_bytes: u64,
    pub status_message: String,
}

impl App {
    pub fn new(provider: Arc<dyn CompletionProvider>, storage: Arc<dyn Storage>) -> Self {
        let threads = ThreadStore::load(storage);
        let status_message = match threads.load_warning() {
            Some(warning) => format!("Starting fresh: {warning}"),
            None => String::from("Welcome to Susu!"),
        };
        Self {
            dispatcher: Arc::new(Dispatcher::new(provider)),
            threads,
            session: SessionState::Draft,
            messages: Vec::new(),
            persisted_len: 0,
            attachments: AttachmentStore::new(),
            models: default_models(),
            selected_model: 0,
            generation: 0,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            status_message,
        }
    }

    pub fn from_config(
        provider: Arc<dyn CompletionProvider>,
        storage: Arc<dyn Storage>,
        config: &ResolvedConfig,
    ) -> Self {
        let mut app = Self::new(provider, storage);
        if !config.models.is_empty() {
            app.models = config.models.clone();
        }
        app.selected_model = app
            .models
            .iter()
            .position(|m| m.id == config.model_id)
            .unwrap_or(0);
        app.max_attachment_bytes = config.max_attachment_bytes;
        app
    }

    pub fn selected_model(&self) -> &ModelDescriptor {
        &self.models[self.selected_model]
    }

    /// True while a dispatch holds the single-flight ticket.
    pub fn is_loading(&self) -> bool {
        self.dispatcher.is_busy()
    }

    /// Messages in view that no thread has stored yet.
    pub fn unsynced(&self) -> &[Message] {
        &self.messages[self.persisted_len.min(self.messages.len())..]
    }
}
