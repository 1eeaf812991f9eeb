//! Chat message format (OpenAI-compatible) and cache-key derivation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::System, MessageContent::text(text))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::User, MessageContent::text(text))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::Assistant, MessageContent::text(text))
    }

    /// A user turn mixing text and images (vision models).
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::with_content(MessageRole::User, MessageContent::Parts(parts))
    }

    pub fn with_content(role: MessageRole, content: MessageContent) -> Self {
        Self { role, content }
    }

    pub fn contains_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => {
                parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. }))
            }
        }
    }

    /// Canonical text of this message: the plain text, or the text parts joined by a
    /// single space in order. Image parts contribute nothing.
    pub fn cache_key(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Cache key of a conversation: the key of its final message.
pub fn fingerprint(messages: &[Message]) -> Option<String> {
    messages.last().map(Message::cache_key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text(text.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
