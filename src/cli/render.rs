//! Plain-text rendering of core state for the terminal.

use std::fmt::Write;

use crate::core::attachment::AttachmentStore;
use crate::core::session::SessionState;
use crate::core::thread_store::Thread;
use crate::inference::{Message, ModelDescriptor, Role};

pub fn render_message(message: &Message) -> String {
    let mut out = String::new();
    match message.role {
        Role::User => {
            let _ = write!(out, "you> {}", message.visible_text());
            for attachment in &message.attachments {
                let kind = if attachment.is_image() { "image" } else { "file" };
                let _ = write!(out, "\n     [{kind}: {}]", attachment.name);
            }
        }
        Role::Assistant => {
            let _ = write!(out, "ai> {}", message.visible_text());
        }
    }
    out
}

pub fn render_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "(empty chat)".to_string();
    }
    messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered list, newest first; `*` marks the active thread.
pub fn render_threads(threads: &[Thread], session: &SessionState) -> String {
    if threads.is_empty() {
        return "No saved chats".to_string();
    }
    let mut out = String::new();
    for (i, thread) in threads.iter().enumerate() {
        let marker = if session.is_active(&thread.id) { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker}{:>3}. {:<30}  {}  ({} msgs)",
            i + 1,
            thread.title,
            thread.created_at.format("%Y-%m-%d %H:%M"),
            thread.messages.len()
        );
    }
    out.trim_end().to_string()
}

pub fn render_models(models: &[ModelDescriptor], selected: usize) -> String {
    let mut out = String::new();
    for (i, model) in models.iter().enumerate() {
        let marker = if i == selected { '*' } else { ' ' };
        let vision = if model.supports_images { "  [vision]" } else { "" };
        let _ = writeln!(
            out,
            "{marker} {} ({}, {}){vision}",
            model.id, model.display_name, model.provider
        );
    }
    out.trim_end().to_string()
}

pub fn render_attachments(store: &AttachmentStore) -> String {
    let mut out = String::new();
    for pending in store.pending() {
        let _ = writeln!(
            out,
            "#{} {} ({})",
            pending.id, pending.attachment.name, pending.attachment.mime_type
        );
    }
    if store.in_flight_count() > 0 {
        let _ = writeln!(out, "{} still reading...", store.in_flight_count());
    }
    if out.is_empty() {
        return "No attachments".to_string();
    }
    out.trim_end().to_string()
}
