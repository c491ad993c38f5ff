//! # Actions
//!
//! Everything that can happen in Susu becomes an `Action`.
//! User sends a message? That's `Action::Submit(text)`.
//! The API answers? That's `Action::CompletionFinished(completion)`.
//!
//! The `update()` function takes the current state and an action, applies
//! the transition, and returns an `Effect` describing the I/O to start
//! (a dispatch, some file reads). The caller runs the effect and feeds the
//! result back in as another action.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! Every failure ends here: it becomes a status message, a synthetic
//! assistant reply, or a reset to Draft. Nothing propagates further.

use std::path::PathBuf;

use log::{debug, info, warn};

use crate::core::attachment::{Attachment, AttachmentId, IngestError, IngestOutcome};
use crate::core::composer::{compose, to_request_payload};
use crate::core::dispatch::{Dispatcher, InFlight, failure_message};
use crate::core::session::SessionState;
use crate::core::state::App;
use crate::inference::{Message, ModelDescriptor, ProviderError, WireMessage};

#[derive(Debug)]
pub enum Action {
    /// Send the typed text with every finished attachment.
    Submit(String),
    /// Start reading these files as attachments.
    Attach(Vec<PathBuf>),
    /// One file read finished.
    AttachmentRead {
        id: AttachmentId,
        result: Result<Attachment, IngestError>,
    },
    RemoveAttachment(AttachmentId),
    CompletionFinished(Completion),
    NewChat,
    SelectThread(String),
    DeleteThread(String),
    SelectModel(String),
    Logout,
    Quit,
}

/// The outcome of a dispatch, with everything needed to route it.
#[derive(Debug)]
pub struct Completion {
    pub result: Result<Message, ProviderError>,
    origin: SessionState,
    generation: u64,
    unsynced: Vec<Message>,
    ticket: InFlight,
}

/// A dispatch ready to run. Holds the single-flight ticket until the
/// resulting `Completion` has been applied.
#[derive(Debug)]
pub struct DispatchJob {
    ticket: InFlight,
    payload: Vec<WireMessage>,
    model: ModelDescriptor,
    origin: SessionState,
    generation: u64,
    unsynced: Vec<Message>,
}

impl DispatchJob {
    pub fn payload(&self) -> &[WireMessage] {
        &self.payload
    }

    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    /// Sends the request and wraps the outcome as an action.
    pub async fn run(self, dispatcher: &Dispatcher) -> Action {
        let result = dispatcher
            .dispatch(&self.ticket, &self.payload, &self.model)
            .await;
        Action::CompletionFinished(Completion {
            result,
            origin: self.origin,
            generation: self.generation,
            unsynced: self.unsynced,
            ticket: self.ticket,
        })
    }
}

/// Side effects requested by `update()`.
#[derive(Debug)]
pub enum Effect {
    None,
    Dispatch(DispatchJob),
    ReadAttachments {
        jobs: Vec<(AttachmentId, PathBuf)>,
        max_bytes: u64,
    },
    Logout,
    Quit,
}

pub fn update(app: &mut App, action: Action) -> Effect {
    debug!("update: {:?}", action_label(&action));
    match action {
        Action::Submit(text) => submit(app, text),
        Action::Attach(paths) => {
            if paths.is_empty() {
                app.status_message = "No files given".to_string();
                return Effect::None;
            }
            let jobs: Vec<_> = paths
                .into_iter()
                .map(|path| (app.attachments.begin(), path))
                .collect();
            app.status_message = format!("Reading {} file(s)...", jobs.len());
            Effect::ReadAttachments {
                jobs,
                max_bytes: app.max_attachment_bytes,
            }
        }
        Action::AttachmentRead { id, result } => {
            app.status_message = match app.attachments.complete(id, result) {
                IngestOutcome::Added(id) => format!("Attached #{id}"),
                IngestOutcome::Failed(e) => format!("Attachment failed: {e}"),
                IngestOutcome::Discarded => return Effect::None,
            };
            Effect::None
        }
        Action::RemoveAttachment(id) => {
            app.status_message = if app.attachments.remove(id) {
                format!("Removed #{id}")
            } else {
                format!("No attachment #{id}")
            };
            Effect::None
        }
        Action::CompletionFinished(completion) => {
            finish(app, completion);
            Effect::None
        }
        Action::NewChat => {
            start_new_chat(app);
            app.status_message = "New chat".to_string();
            Effect::None
        }
        Action::SelectThread(id) => {
            select_thread(app, &id);
            Effect::None
        }
        Action::DeleteThread(id) => {
            delete_thread(app, &id);
            Effect::None
        }
        Action::SelectModel(id) => {
            match app.models.iter().position(|m| m.id == id) {
                Some(index) => {
                    app.selected_model = index;
                    let model = app.selected_model();
                    app.status_message = format!(
                        "Model: {}{}",
                        model.display_name,
                        if model.supports_images { " (vision)" } else { "" }
                    );
                }
                None => app.status_message = format!("Unknown model: {id}"),
            }
            Effect::None
        }
        Action::Logout => Effect::Logout,
        Action::Quit => Effect::Quit,
    }
}

fn action_label(action: &Action) -> &'static str {
    match action {
        Action::Submit(_) => "Submit",
        Action::Attach(_) => "Attach",
        Action::AttachmentRead { .. } => "AttachmentRead",
        Action::RemoveAttachment(_) => "RemoveAttachment",
        Action::CompletionFinished(_) => "CompletionFinished",
        Action::NewChat => "NewChat",
        Action::SelectThread(_) => "SelectThread",
        Action::DeleteThread(_) => "DeleteThread",
        Action::SelectModel(_) => "SelectModel",
        Action::Logout => "Logout",
        Action::Quit => "Quit",
    }
}

fn submit(app: &mut App, text: String) -> Effect {
    let Some(ticket) = app.dispatcher.try_begin() else {
        app.status_message = "Still waiting for the previous reply".to_string();
        return Effect::None;
    };

    let attachments = app.attachments.take_all();
    let message = match compose(&text, attachments, app.selected_model()) {
        Ok(message) => message,
        Err(e) => {
            app.status_message = format!("Not sent: {e}");
            return Effect::None;
        }
    };

    app.messages.push(message);
    let model = app.selected_model().clone();
    let payload = to_request_payload(&app.messages, &model);
    app.status_message = "Thinking...".to_string();
    info!(
        "Submitting turn: {} message(s) in history, model={}",
        app.messages.len(),
        model.id
    );

    Effect::Dispatch(DispatchJob {
        ticket,
        payload,
        model,
        origin: app.session.clone(),
        generation: app.generation,
        unsynced: app.unsynced().to_vec(),
    })
}

fn finish(app: &mut App, completion: Completion) {
    let Completion {
        result,
        origin,
        generation,
        unsynced,
        ticket,
    } = completion;
    let in_view = generation == app.generation;

    match result {
        Ok(reply) => {
            let mut exchange = unsynced;
            exchange.push(reply.clone());

            if in_view {
                app.messages.push(reply);
                match origin.commit(&mut app.threads, exchange) {
                    Ok(next) => {
                        app.session = next;
                        app.persisted_len = app.messages.len();
                        app.status_message = "Reply received".to_string();
                    }
                    Err(e) => {
                        warn!("Active thread vanished: {}", e);
                        app.session = SessionState::Draft;
                        app.persisted_len = 0;
                        app.status_message = format!("{e}; continuing as a new chat");
                    }
                }
            } else {
                // The view moved on while the request ran. Store the reply
                // where it came from and leave the current view alone.
                match origin.commit(&mut app.threads, exchange) {
                    Ok(next) => {
                        info!("Stored late reply into {:?}", next);
                        let refreshed = next
                            .active_id()
                            .filter(|id| app.session.is_active(id))
                            .and_then(|id| app.threads.get(id))
                            .map(|thread| thread.messages.clone());
                        if let Some(messages) = refreshed {
                            app.messages = messages;
                            app.persisted_len = app.messages.len();
                        }
                    }
                    Err(e) => {
                        warn!("Dropping late reply: {}", e);
                        app.status_message = format!("Reply discarded: {e}");
                    }
                }
            }
        }
        Err(e) => {
            if in_view {
                app.messages.push(failure_message(&e));
                app.status_message = e.to_string();
            } else if origin.active_id().is_some_and(|id| app.session.is_active(id)) {
                // Back on the origin thread: show the failed exchange. It stays
                // past `persisted_len` until the next success stores it.
                warn!("Late failure for the thread in view: {}", e);
                app.messages.extend(unsynced);
                app.messages.push(failure_message(&e));
                app.status_message = e.to_string();
            } else {
                warn!("Late failure for a chat not in view: {}", e);
                app.status_message = format!("A background reply failed: {e}");
            }
        }
    }

    drop(ticket);
}

fn start_new_chat(app: &mut App) {
    app.session = SessionState::Draft;
    app.messages.clear();
    app.persisted_len = 0;
    app.attachments.clear();
    app.generation += 1;
}

fn select_thread(app: &mut App, id: &str) {
    match app.threads.get(id) {
        Some(thread) => {
            app.messages = thread.messages.clone();
            app.persisted_len = app.messages.len();
            app.status_message = format!("Opened '{}'", thread.title);
            app.session = SessionState::Active(id.to_string());
            app.generation += 1;
        }
        None => {
            warn!("Cannot select missing thread {}", id);
            start_new_chat(app);
            app.status_message = format!("Thread {id} not found");
        }
    }
}

fn delete_thread(app: &mut App, id: &str) {
    let Some(removed) = app.threads.remove(id) else {
        app.status_message = format!("Thread {id} not found");
        return;
    };
    if app.session.is_active(id) {
        start_new_chat(app);
    }
    app.status_message = format!("Deleted '{}'", removed.title);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::NETWORK_ERROR_REPLY;
    use crate::inference::{Content, Role};
    use crate::test_support::{ScriptedProvider, image_attachment, test_app, test_app_with};
    use std::sync::Arc;

    /// Runs Submit and the resulting dispatch to completion.
    async fn send(app: &mut App, text: &str) {
        match update(app, Action::Submit(text.to_string())) {
            Effect::Dispatch(job) => {
                let dispatcher = app.dispatcher.clone();
                let action = job.run(&dispatcher).await;
                update(app, action);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_reply_creates_thread_and_activates_it() {
        let mut app = test_app_with(ScriptedProvider::replying("Hi!"));
        update(&mut app, Action::SelectModel("deepseek/deepseek-chat".to_string()));
        send(&mut app, "Hello").await;

        let id = app.session.active_id().expect("active").to_string();
        let thread = app.threads.get(&id).unwrap();
        assert_eq!(thread.title, "Hello");
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[0].content, Content::Text("Hello".to_string()));
        assert_eq!(thread.messages[1], Message::assistant("Hi!"));
        assert_eq!(app.messages, thread.messages);
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_second_reply_appends_to_active_thread() {
        let mut app = test_app_with(ScriptedProvider::replying("ok"));
        send(&mut app, "one").await;
        let id = app.session.active_id().unwrap().to_string();
        send(&mut app, "two").await;

        assert_eq!(app.session.active_id(), Some(id.as_str()));
        assert_eq!(app.threads.len(), 1);
        assert_eq!(app.threads.get(&id).unwrap().messages.len(), 4);
    }

    #[test]
    fn test_empty_submission_does_not_dispatch() {
        let mut app = test_app();
        let effect = update(&mut app, Action::Submit("   ".to_string()));
        assert!(matches!(effect, Effect::None));
        assert!(app.messages.is_empty());
        assert!(!app.is_loading());
        assert!(app.status_message.contains("nothing to send"));
    }

    #[test]
    fn test_second_submit_while_busy_is_refused() {
        let mut app = test_app();
        let first = update(&mut app, Action::Submit("one".to_string()));
        assert!(matches!(first, Effect::Dispatch(_)));
        assert!(app.is_loading());

        let second = update(&mut app, Action::Submit("two".to_string()));
        assert!(matches!(second, Effect::None));
        assert_eq!(app.messages.len(), 1);

        drop(first);
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_failure_appends_error_reply_without_persisting() {
        let mut app = test_app_with(ScriptedProvider::failing(ProviderError::Network(
            "refused".to_string(),
        )));
        send(&mut app, "Hello").await;

        assert!(app.session.is_draft());
        assert!(app.threads.is_empty());
        assert_eq!(app.messages.len(), 2);
        assert_eq!(
            app.messages[1].content,
            Content::Text(NETWORK_ERROR_REPLY.to_string())
        );
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_failed_exchange_is_captured_by_next_success() {
        let provider = ScriptedProvider::failing(ProviderError::Network("down".to_string()));
        let mut app = test_app_with(provider);
        send(&mut app, "first try").await;
        send(&mut app, "second try").await;

        let id = app.session.active_id().unwrap().to_string();
        let thread = app.threads.get(&id).unwrap();
        let texts: Vec<_> = thread.messages.iter().map(|m| m.visible_text()).collect();
        assert_eq!(
            texts,
            vec!["first try", NETWORK_ERROR_REPLY, "second try", "ok"]
        );
        assert_eq!(thread.title, "first try");
    }

    #[tokio::test]
    async fn test_model_switch_reshapes_whole_history() {
        let provider = Arc::new(ScriptedProvider::replying("seen"));
        let mut app = test_app_with(provider.clone());

        let id = app.attachments.begin();
        app.attachments.complete(id, Ok(image_attachment("cat.png")));
        send(&mut app, "look").await;

        update(&mut app, Action::SelectModel("deepseek/deepseek-chat".to_string()));
        send(&mut app, "and now?").await;

        let requests = provider.requests();
        assert_eq!(requests[0].1[0].content.image_count(), 1);
        let second = &requests[1].1;
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].content, Content::Text("look".to_string()));
        assert_eq!(second[2].content, Content::Text("and now?".to_string()));

        // The stored history keeps the image for re-rendering.
        assert_eq!(app.messages[0].attachments.len(), 1);
        assert_eq!(app.messages[0].content.image_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_active_thread_resets_to_empty_draft() {
        let mut app = test_app_with(ScriptedProvider::replying("Hi!"));
        send(&mut app, "Hello").await;
        let id = app.session.active_id().unwrap().to_string();

        update(&mut app, Action::DeleteThread(id));
        assert!(app.session.is_draft());
        assert!(app.messages.is_empty());
        assert!(app.threads.is_empty());
    }

    #[tokio::test]
    async fn test_delete_other_thread_keeps_state() {
        let mut app = test_app_with(ScriptedProvider::replying("ok"));
        send(&mut app, "first").await;
        let first = app.session.active_id().unwrap().to_string();
        update(&mut app, Action::NewChat);
        send(&mut app, "second").await;
        let second = app.session.active_id().unwrap().to_string();

        update(&mut app, Action::DeleteThread(first));
        assert_eq!(app.session.active_id(), Some(second.as_str()));
        assert_eq!(app.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_select_thread_replaces_view() {
        let mut app = test_app_with(ScriptedProvider::replying("ok"));
        send(&mut app, "first").await;
        let first = app.session.active_id().unwrap().to_string();
        update(&mut app, Action::NewChat);
        assert!(app.messages.is_empty());
        send(&mut app, "second").await;

        update(&mut app, Action::SelectThread(first.clone()));
        assert!(app.session.is_active(&first));
        assert_eq!(app.messages[0].visible_text(), "first");
        assert_eq!(app.threads.all()[0].title, "second");
    }

    #[test]
    fn test_select_missing_thread_resets_to_draft() {
        let mut app = test_app();
        app.session = SessionState::Active("ghost".to_string());
        update(&mut app, Action::SelectThread("ghost".to_string()));
        assert!(app.session.is_draft());
        assert!(app.status_message.contains("not found"));
    }

    #[test]
    fn test_new_chat_clears_pending_attachments() {
        let mut app = test_app();
        let id = app.attachments.begin();
        app.attachments.complete(id, Ok(image_attachment("a.png")));
        update(&mut app, Action::NewChat);
        assert!(app.attachments.is_empty());
        assert!(app.session.is_draft());
    }

    #[tokio::test]
    async fn test_reply_after_new_chat_goes_to_origin_draft() {
        let mut app = test_app_with(ScriptedProvider::replying("late"));
        let Effect::Dispatch(job) = update(&mut app, Action::Submit("Hello".to_string())) else {
            panic!("expected dispatch");
        };
        update(&mut app, Action::NewChat);

        let dispatcher = app.dispatcher.clone();
        let action = job.run(&dispatcher).await;
        update(&mut app, action);

        assert!(app.session.is_draft());
        assert!(app.messages.is_empty());
        assert_eq!(app.threads.len(), 1);
        assert_eq!(app.threads.all()[0].messages.len(), 2);
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn test_reply_for_deleted_thread_is_dropped() {
        let mut app = test_app_with(ScriptedProvider::replying("ok"));
        send(&mut app, "Hello").await;
        let id = app.session.active_id().unwrap().to_string();

        let Effect::Dispatch(job) = update(&mut app, Action::Submit("more".to_string())) else {
            panic!("expected dispatch");
        };
        update(&mut app, Action::DeleteThread(id));
        let dispatcher = app.dispatcher.clone();
        let action = job.run(&dispatcher).await;
        update(&mut app, action);

        assert!(app.threads.is_empty());
        assert!(app.session.is_draft());
        assert!(!app.is_loading());
        assert!(app.status_message.contains("Reply discarded"));
    }

    #[tokio::test]
    async fn test_late_failure_shows_on_reopened_origin_thread() {
        let provider = Arc::new(
            ScriptedProvider::replying("first")
                .then(Ok("first".to_string()))
                .then(Err(ProviderError::Network("reset".to_string()))),
        );
        let mut app = test_app_with(provider);
        send(&mut app, "Hello").await;
        let origin = app.session.active_id().unwrap().to_string();

        let Effect::Dispatch(job) = update(&mut app, Action::Submit("lost question".to_string()))
        else {
            panic!("expected dispatch");
        };
        update(&mut app, Action::NewChat);
        update(&mut app, Action::SelectThread(origin.clone()));

        let dispatcher = app.dispatcher.clone();
        let action = job.run(&dispatcher).await;
        update(&mut app, action);

        let texts: Vec<_> = app.messages.iter().map(|m| m.visible_text()).collect();
        assert_eq!(texts, vec!["Hello", "first", "lost question", NETWORK_ERROR_REPLY]);
        assert_eq!(app.persisted_len, 2);
        assert!(!app.is_loading());

        // The next success stores the failed exchange with it.
        send(&mut app, "again").await;
        assert_eq!(app.threads.get(&origin).unwrap().messages.len(), 6);
    }

    #[tokio::test]
    async fn test_late_failure_elsewhere_sets_status() {
        let mut app = test_app_with(ScriptedProvider::failing(ProviderError::Network(
            "reset".to_string(),
        )));
        let Effect::Dispatch(job) = update(&mut app, Action::Submit("Hello".to_string())) else {
            panic!("expected dispatch");
        };
        update(&mut app, Action::NewChat);

        let dispatcher = app.dispatcher.clone();
        let action = job.run(&dispatcher).await;
        update(&mut app, action);

        assert!(app.messages.is_empty());
        assert!(app.threads.is_empty());
        assert!(app.status_message.contains("background reply failed"));
    }

    #[tokio::test]
    async fn test_reply_into_missing_active_thread_starts_over_as_draft() {
        let mut app = test_app_with(ScriptedProvider::replying("ok"));
        app.session = SessionState::Active("ghost".to_string());
        send(&mut app, "Hello").await;

        assert!(app.session.is_draft());
        assert_eq!(app.persisted_len, 0);
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1], Message::assistant("ok"));
        assert!(app.status_message.contains("not found"));
        assert!(app.threads.is_empty());

        send(&mut app, "again").await;
        assert_eq!(app.threads.len(), 1);
        let thread = &app.threads.all()[0];
        assert_eq!(thread.messages.len(), 4);
        assert_eq!(thread.title, "Hello");
        assert!(app.session.is_active(&thread.id));
    }

    #[test]
    fn test_attach_allocates_ids_before_reading() {
        let mut app = test_app();
        let effect = update(
            &mut app,
            Action::Attach(vec![PathBuf::from("a.png"), PathBuf::from("b.txt")]),
        );
        let Effect::ReadAttachments { jobs, .. } = effect else {
            panic!("expected reads");
        };
        assert_eq!(jobs.len(), 2);
        assert_ne!(jobs[0].0, jobs[1].0);
        assert_eq!(app.attachments.in_flight_count(), 2);

        update(
            &mut app,
            Action::AttachmentRead {
                id: jobs[1].0,
                result: Ok(image_attachment("b.png")),
            },
        );
        assert_eq!(app.attachments.pending()[0].id, jobs[1].0);
    }

    #[test]
    fn test_unknown_model_keeps_selection() {
        let mut app = test_app();
        update(&mut app, Action::SelectModel("nope/none".to_string()));
        assert_eq!(app.selected_model().id, "openai/gpt-4o-mini");
        assert!(app.status_message.contains("Unknown model"));
    }

    #[test]
    fn test_submit_records_user_message_shape() {
        let mut app = test_app();
        let effect = update(&mut app, Action::Submit("Hello".to_string()));
        let Effect::Dispatch(job) = effect else {
            panic!("expected dispatch");
        };
        assert_eq!(job.model().id, "openai/gpt-4o-mini");
        assert_eq!(job.payload().len(), 1);
        assert_eq!(job.payload()[0].role, Role::User);
    }
}
