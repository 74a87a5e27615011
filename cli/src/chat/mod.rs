//! Chat relay to the Bloriko assistant.
//!
//! This module provides the conversation kept on this device and the relay
//! seam it talks through:
//! - [`ChatApi`] - Relay operation (enables mocking)
//! - [`Conversation`] - Message history sent as context with every turn
//!
//! The relay is stateless: each turn carries the whole history. Local
//! failure notices stay in the history for display but are left out of the
//! context.

pub mod model;

pub use model::{ChatMessage, ChatReply, ChatRole, MODEL};

use async_trait::async_trait;
use tracing::warn;

use crate::auth::Identity;
use crate::error::Result;

const GREETING: &str = "Hi! I'm Bloriko, the little painter of Bloret. \
Ask me anything about Minecraft or the server.";
const PENDING_NOTICE: &str = "Looking that up...";

/// The chat relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Sends the conversation so far and returns the assistant's reply.
    ///
    /// # Errors
    ///
    /// Returns [`BloretError::Provider`](crate::error::BloretError::Provider)
    /// when the relay answers with `status: false`, or a transport or decode
    /// error.
    async fn reply(&self, identity: &Identity, context: &[ChatMessage]) -> Result<ChatReply>;
}

/// Message history of one chat.
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(GREETING)],
        }
    }
}

impl Conversation {
    /// Every message so far, greeting first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Sends one user turn and records the answer.
    ///
    /// Blank input is ignored. A failed turn is recorded as an error
    /// message rather than returned.
    pub async fn send(
        &mut self,
        api: &dyn ChatApi,
        identity: &Identity,
        text: &str,
    ) -> Option<&ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(text));

        let context: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|message| !message.is_error)
            .cloned()
            .collect();

        let answer = match api.reply(identity, &context).await {
            Ok(ChatReply::Message(content)) => ChatMessage::assistant(content),
            Ok(ChatReply::Pending { message, .. }) => {
                ChatMessage::assistant(message.unwrap_or_else(|| PENDING_NOTICE.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "chat turn failed");
                ChatMessage::error(e.to_string())
            }
        };
        self.messages.push(answer);
        self.messages.last()
    }
}
