//! Chat message and reply types.

use serde::Serialize;

/// Model name the relay routes to.
pub const MODEL: &str = "Bloriko";

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One line of the conversation.
///
/// Serializes as a relay context item: `{"role": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Local failure notice; never sent back to the relay.
    #[serde(skip)]
    pub is_error: bool,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            is_error: true,
        }
    }
}

/// What the relay answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// The assistant's answer.
    Message(String),
    /// The relay is still working (e.g. a tool call) and sent only a notice.
    Pending {
        message: Option<String>,
        connection_id: Option<String>,
    },
}
