//! In-memory view model for the active conversation
//!
//! The view model holds the authoritative message order for the session.
//! Every mutation is mirrored to the store; store failures are logged and
//! never surfaced as fatal, because the user has already seen the
//! mutation take effect.

use crate::conversation::{Conversation, Message};
use crate::store::{ConversationPatch, ConversationStore};
use tracing::warn;

/// View model owning the active conversation's in-memory state
pub struct ConversationViewModel {
    store: ConversationStore,
    user_id: String,
    active: Option<Conversation>,
}

impl ConversationViewModel {
    /// Create a view model with no active conversation
    pub fn new(store: ConversationStore, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            active: None,
        }
    }

    /// Make a conversation active, resetting state wholesale
    ///
    /// Any leftover in-memory state from the previous conversation is
    /// discarded, never merged.
    pub fn set_active(&mut self, conversation: Conversation) {
        self.active = Some(conversation);
    }

    /// The active conversation, if any
    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    /// The active conversation's id, if any
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|c| c.id.as_str())
    }

    /// The active conversation's messages (empty when none is active)
    pub fn messages(&self) -> &[Message] {
        self.active
            .as_ref()
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Append or replace a message by id, then mirror to the store
    pub fn apply(&mut self, message: Message) {
        self.apply_in_memory(message);
        self.sync();
    }

    /// Append or replace a message by id without persisting
    ///
    /// Used per streaming chunk to avoid write amplification; the final
    /// chunk goes through [`apply`](Self::apply).
    pub fn apply_in_memory(&mut self, message: Message) {
        if let Some(conversation) = self.active.as_mut() {
            conversation.upsert_message(message);
        } else {
            warn!("Dropping message update: no active conversation");
        }
    }

    /// Set the active conversation's title, then mirror to the store
    pub fn set_title(&mut self, title: impl Into<String>) {
        if let Some(conversation) = self.active.as_mut() {
            conversation.title = title.into();
        }
        self.sync();
    }

    /// Mirror the active conversation to the store
    ///
    /// Failures are logged, not raised; the in-memory state remains the
    /// source of truth for the session.
    pub fn sync(&mut self) {
        let Some(conversation) = self.active.as_ref() else {
            return;
        };

        let patch = ConversationPatch {
            title: Some(conversation.title.clone()),
            messages: Some(conversation.messages.clone()),
            model: Some(conversation.model.clone()),
        };

        match self.store.upsert(&self.user_id, &conversation.id, patch) {
            Ok(persisted) => {
                if let Some(active) = self.active.as_mut() {
                    active.updated_at = persisted.updated_at;
                }
            }
            Err(e) => warn!("Failed to persist conversation: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::MessageBody;
    use crate::store::ConversationStore;

    fn setup() -> (tempfile::TempDir, ConversationStore, ConversationViewModel) {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let store =
            ConversationStore::open(dir.path().join("test.db")).expect("Failed to open store");
        let view = ConversationViewModel::new(store.clone(), "user-1");
        (dir, store, view)
    }

    fn activate(store: &ConversationStore, view: &mut ConversationViewModel) -> String {
        let conversation = store
            .create("user-1", "New Chat", "aurora-flash", vec![])
            .unwrap();
        let id = conversation.id.clone();
        view.set_active(conversation);
        id
    }

    #[test]
    fn test_apply_appends_and_persists() {
        let (_dir, store, mut view) = setup();
        let id = activate(&store, &mut view);

        view.apply(Message::user_text("hello", vec![]));
        assert_eq!(view.messages().len(), 1);

        let persisted = store.get("user-1", &id).unwrap().unwrap();
        assert_eq!(persisted.messages.len(), 1);
        assert_eq!(persisted.messages[0].text(), Some("hello"));
    }

    #[test]
    fn test_apply_same_id_twice_is_idempotent() {
        let (_dir, store, mut view) = setup();
        let id = activate(&store, &mut view);

        let msg = Message::model_text("final answer");
        view.apply(msg.clone());
        view.apply(msg);

        assert_eq!(view.messages().len(), 1);
        let persisted = store.get("user-1", &id).unwrap().unwrap();
        assert_eq!(persisted.messages.len(), 1);
    }

    #[test]
    fn test_in_memory_updates_do_not_persist() {
        let (_dir, store, mut view) = setup();
        let id = activate(&store, &mut view);

        view.apply_in_memory(Message::model_text("chunk"));
        assert_eq!(view.messages().len(), 1);

        let persisted = store.get("user-1", &id).unwrap().unwrap();
        assert!(persisted.messages.is_empty());
    }

    #[test]
    fn test_streaming_replace_then_final_persist() {
        let (_dir, store, mut view) = setup();
        let id = activate(&store, &mut view);

        let placeholder = Message::placeholder();
        let pid = placeholder.id.clone();
        let created_at = placeholder.created_at.clone();
        view.apply(placeholder);

        for text in ["Hel", "Hello", "Hello!"] {
            view.apply_in_memory(Message {
                id: pid.clone(),
                role: crate::conversation::Role::Model,
                created_at: created_at.clone(),
                body: MessageBody::Text {
                    text: text.to_string(),
                    grounding: Vec::new(),
                    attachments: Vec::new(),
                },
            });
        }
        // Final chunk persists.
        view.apply(Message {
            id: pid.clone(),
            role: crate::conversation::Role::Model,
            created_at,
            body: MessageBody::Text {
                text: "Hello!".to_string(),
                grounding: Vec::new(),
                attachments: Vec::new(),
            },
        });

        assert_eq!(view.messages().len(), 1);
        let persisted = store.get("user-1", &id).unwrap().unwrap();
        assert_eq!(persisted.messages.len(), 1);
        assert_eq!(persisted.messages[0].text(), Some("Hello!"));
    }

    #[test]
    fn test_switching_active_resets_wholesale() {
        let (_dir, store, mut view) = setup();
        activate(&store, &mut view);
        view.apply(Message::user_text("residual", vec![]));

        let other = store
            .create(
                "user-1",
                "Other",
                "aurora-flash",
                vec![Message::model_text("greeting")],
            )
            .unwrap();
        view.set_active(other);

        assert_eq!(view.messages().len(), 1);
        assert_eq!(view.messages()[0].text(), Some("greeting"));
    }

    #[test]
    fn test_set_title_persists() {
        let (_dir, store, mut view) = setup();
        let id = activate(&store, &mut view);

        view.set_title("draw a cat");
        let persisted = store.get("user-1", &id).unwrap().unwrap();
        assert_eq!(persisted.title, "draw a cat");
    }

    #[test]
    fn test_no_active_conversation_is_harmless() {
        let (_dir, _store, mut view) = setup();
        view.apply(Message::user_text("dropped", vec![]));
        assert!(view.messages().is_empty());
        assert!(view.active_id().is_none());
    }
}
