//! Conversation documents and the in-memory view model
//!
//! A conversation is an ordered, append-only transcript of messages plus
//! identity metadata. The view model in this module owns the in-memory
//! copy of the active conversation and mirrors every mutation to the
//! store.

pub mod message;
pub mod view_model;

pub use message::{now_rfc3339, Attachment, GroundingChunk, Message, MessageBody, Role};
pub use view_model::ConversationViewModel;

use serde::{Deserialize, Serialize};

/// Persisted conversation document
///
/// Identity is `id` (assigned by the store on creation). Message order is
/// chronological and significant; messages are never reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier (ULID)
    pub id: String,

    /// Display title
    pub title: String,

    /// Ordered transcript
    pub messages: Vec<Message>,

    /// Model tier name this conversation defaults to
    pub model: String,

    /// Creation timestamp (RFC-3339)
    pub created_at: String,

    /// Last-update timestamp (RFC-3339)
    pub updated_at: String,
}

impl Conversation {
    /// Append a message, or replace the existing message with the same id
    ///
    /// Replacement by id is how streaming updates land without creating
    /// duplicates; the operation is idempotent.
    ///
    /// # Examples
    ///
    /// ```
    /// use polymode::conversation::{Conversation, Message};
    ///
    /// let mut conversation = Conversation {
    ///     id: "c1".to_string(),
    ///     title: "New Chat".to_string(),
    ///     messages: vec![],
    ///     model: "aurora-flash".to_string(),
    ///     created_at: polymode::conversation::now_rfc3339(),
    ///     updated_at: polymode::conversation::now_rfc3339(),
    /// };
    ///
    /// let msg = Message::model_text("hi");
    /// conversation.upsert_message(msg.clone());
    /// conversation.upsert_message(msg);
    /// assert_eq!(conversation.messages.len(), 1);
    /// ```
    pub fn upsert_message(&mut self, message: Message) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            self.messages.push(message);
        }
    }

    /// The most recent model text turn, if any
    ///
    /// Used by speech synthesis to pick what to read aloud.
    pub fn last_model_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Model)
            .find_map(|m| m.text())
    }
}
