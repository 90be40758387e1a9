/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `chat`          — Interactive multi-modal chat session
- `conversations` — List stored conversations
- `speak`         — Synthesize the latest model response to audio

These handlers are intentionally small and use the library components:
the gateway, the store, the view model, and the orchestrator.
*/

pub mod chat;
pub mod conversations;
pub mod speak;

use crate::config::Config;
use crate::conversation::{Conversation, Message};
use crate::error::Result;
use crate::identity::UserProfile;
use crate::store::ConversationStore;

/// Open the store and load the user's conversations, bootstrapping a
/// greeting conversation when none exist
///
/// Failure here is fatal to the session: the application cannot function
/// without at least one loaded or created conversation, so the error
/// (including the permission remediation text) propagates to the top.
pub(crate) fn load_or_bootstrap(
    config: &Config,
    user: &UserProfile,
) -> Result<(ConversationStore, Vec<Conversation>)> {
    let store = ConversationStore::open(config.storage.data_path())?;
    let mut conversations = store.fetch_all(&user.uid)?;

    if conversations.is_empty() {
        tracing::info!("No conversations for user {}, creating greeting", user.uid);
        let greeting = store.create(
            &user.uid,
            &config.chat.default_title,
            &config.backend.fast_model,
            vec![Message::model_text(&config.chat.greeting)],
        )?;
        conversations.push(greeting);
    }

    Ok((store, conversations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("conversations.db"));
        config
    }

    fn test_user() -> UserProfile {
        UserProfile {
            uid: "user-1".to_string(),
            name: None,
            email: None,
            photo_url: None,
        }
    }

    #[test]
    fn test_bootstrap_creates_greeting_conversation() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let user = test_user();

        let (_store, conversations) = load_or_bootstrap(&config, &user).unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "New Chat");
        assert_eq!(conversations[0].messages.len(), 1);
        assert_eq!(
            conversations[0].messages[0].text(),
            Some("Hello! How can I help you today?")
        );
    }

    #[test]
    fn test_bootstrap_reuses_existing_conversations() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let user = test_user();

        let (_store, first) = load_or_bootstrap(&config, &user).unwrap();
        let (_store, second) = load_or_bootstrap(&config, &user).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
    }
}
