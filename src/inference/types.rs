use serde::{Deserialize, Serialize};

use crate::core::attachment::Attachment;

/// Who authored a message. Serialized in chat-completions terminology.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// URL wrapper for an image part. The url is a base64 data-URL for local files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

/// One segment of multi-part content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::ImageUrl { .. })
    }
}

/// The literal payload exchanged with the completion API.
///
/// Untagged on the wire: a plain string or an array of parts. In Rust the
/// two shapes are distinct variants and every caller matches on them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Text of the first text part (or the whole string for `Text`).
    /// Empty when multi-part content carries only images.
    pub fn leading_text(&self) -> &str {
        match self {
            Content::Text(text) => text,
            Content::Parts(parts) => parts
                .iter()
                .find_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .unwrap_or(""),
        }
    }

    /// Number of image parts.
    pub fn image_count(&self) -> usize {
        match self {
            Content::Text(_) => 0,
            Content::Parts(parts) => parts.iter().filter(|p| p.is_image()).count(),
        }
    }
}

/// A single entry in a conversation.
///
/// `display_text` and `attachments` only appear on user messages and exist
/// purely for re-rendering history. They are never re-derived from `content`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(content.into()),
            display_text: None,
            attachments: Vec::new(),
        }
    }

    /// Plain-text user message with no attachments.
    pub fn user_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            role: Role::User,
            content: Content::Text(text.clone()),
            display_text: Some(text),
            attachments: Vec::new(),
        }
    }

    /// What a history view should show for this message.
    pub fn visible_text(&self) -> &str {
        match (&self.role, &self.display_text) {
            (Role::User, Some(text)) => text,
            _ => self.content.leading_text(),
        }
    }
}

/// One element of the request body's `messages` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub role: Role,
    pub content: Content,
}

/// A selectable remote model. Statically enumerated, immutable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub provider: String,
    pub supports_images: bool,
}

impl ModelDescriptor {
    pub fn new(id: &str, display_name: &str, provider: &str, supports_images: bool) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            provider: provider.to_string(),
            supports_images,
        }
    }
}

/// Built-in model catalog, used when the config file lists no models.
pub fn default_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new("openai/gpt-4o-mini", "GPT-4o mini", "OpenAI", true),
        ModelDescriptor::new("deepseek/deepseek-chat", "DeepSeek V3", "DeepSeek", false),
        ModelDescriptor::new("anthropic/claude-3-haiku", "Claude 3 Haiku", "Anthropic", true),
    ]
}
