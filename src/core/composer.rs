//! # Message Composer
//!
//! Two jobs:
//!
//! - [`compose`] builds the pending user message from typed text plus
//!   attachments, shaped for the selected model's capability.
//! - [`to_request_payload`] reshapes an entire history for one dispatch.
//!
//! Non-image files are always inlined into the leading text part as
//! `"\n\n[File: <name>]\n<payload>"`. Images become image parts for
//! vision-capable models and are dropped for everything else.
//!
//! Reshaping applies to *every* prior user message, not just the newest:
//! switching to a text-only model strips image parts from the whole history
//! on the next dispatch, so the request always matches the target model.

use thiserror::Error;

use crate::core::attachment::Attachment;
use crate::inference::{Content, ContentPart, Message, ModelDescriptor, Role, WireMessage};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// Blank text and no attachments. Nothing is dispatched.
    #[error("nothing to send")]
    EmptySubmission,
}

/// Inline block appended to the leading text part for a non-image file.
fn inline_file(name: &str, payload: &str) -> String {
    format!("\n\n[File: {name}]\n{payload}")
}

/// Builds the pending user message.
///
/// `display_text` keeps the raw typed text and `attachments` the original
/// list; both are for re-rendering only.
pub fn compose(
    text: &str,
    attachments: Vec<Attachment>,
    model: &ModelDescriptor,
) -> Result<Message, ComposeError> {
    let has_text = !text.trim().is_empty();
    if !has_text && attachments.is_empty() {
        return Err(ComposeError::EmptySubmission);
    }

    let mut leading: Option<String> = has_text.then(|| text.to_string());
    let mut images: Vec<ContentPart> = Vec::new();

    for attachment in &attachments {
        if attachment.is_image() {
            images.push(ContentPart::image(attachment.payload.clone()));
        } else {
            leading
                .get_or_insert_with(String::new)
                .push_str(&inline_file(&attachment.name, &attachment.payload));
        }
    }

    let content = if model.supports_images {
        let mut parts = Vec::with_capacity(images.len() + 1);
        if let Some(text) = leading {
            parts.push(ContentPart::text(text));
        }
        parts.extend(images);
        Content::Parts(parts)
    } else {
        Content::Text(leading.unwrap_or_default())
    };

    Ok(Message {
        role: Role::User,
        content,
        display_text: Some(text.to_string()),
        attachments,
    })
}

/// Reshapes one message for the target model.
fn reshape(message: &Message, model: &ModelDescriptor) -> WireMessage {
    let content = match (&message.role, &message.content) {
        (Role::User, Content::Parts(_)) if !model.supports_images => {
            Content::Text(message.content.leading_text().to_string())
        }
        _ => message.content.clone(),
    };
    WireMessage {
        role: message.role,
        content,
    }
}

/// Reshapes the whole history into the request's `messages` array.
pub fn to_request_payload(history: &[Message], model: &ModelDescriptor) -> Vec<WireMessage> {
    history.iter().map(|m| reshape(m, model)).collect()
}
