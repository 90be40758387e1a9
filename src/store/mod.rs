//! Conversation store adapter
//!
//! Persists conversation documents in an embedded `sled` database, one
//! tree per user id, with JSON values. Listing is ordered by last update
//! (most recent first), creation assigns identifiers and timestamps, and
//! upserts merge a partial patch with last-write-wins semantics.

use crate::conversation::{now_rfc3339, Conversation, Message};
use crate::error::{PolymodeError, Result};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use ulid::Ulid;

/// Remediation steps surfaced when the database denies access
///
/// Permission failures are otherwise silent and non-actionable, so they
/// get a distinguished error kind with concrete steps.
pub const PERMISSION_REMEDIATION: &str = "\
To resolve this:
  1. Check that the data directory exists and is owned by your user.
  2. Check that the directory is writable (no read-only mount).
  3. Make sure no other polymode process holds the database lock.
  4. Optionally point `storage.path` in the config at a writable location.";

/// Partial update applied to a stored conversation
///
/// Only present fields are merged; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationPatch {
    /// Replacement title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Replacement transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,

    /// Replacement model tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Conversation persistence manager
///
/// Wraps an embedded `sled` database. Cloning is cheap and clones share
/// the same underlying database.
#[derive(Clone)]
pub struct ConversationStore {
    db: Db,
}

impl ConversationStore {
    /// Open or create a conversation store
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database directory
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Permission` with remediation steps when the
    /// database cannot be opened due to access denial, `PolymodeError::Storage`
    /// for any other open failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use polymode::store::ConversationStore;
    ///
    /// # fn main() -> polymode::error::Result<()> {
    /// let dir = tempfile::TempDir::new().unwrap();
    /// let store = ConversationStore::open(dir.path().join("conversations.db"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(|e| classify_store_error("Failed to open database", e))?;
        Ok(Self { db })
    }

    /// List all conversations for a user, most recently updated first
    ///
    /// # Arguments
    ///
    /// * `user_id` - The owning user's stable identifier
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Storage` if iteration or deserialization fails.
    pub fn fetch_all(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let tree = self.tree(user_id)?;
        let mut conversations = Vec::new();
        for result in tree.iter() {
            let (_, value) =
                result.map_err(|e| classify_store_error("Iteration failed", e))?;
            let conversation: Conversation = serde_json::from_slice(&value)
                .map_err(|e| PolymodeError::Storage(format!("Deserialization failed: {}", e)))?;
            conversations.push(conversation);
        }

        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    /// Create a conversation, assigning its id and timestamps
    ///
    /// # Arguments
    ///
    /// * `user_id` - The owning user's stable identifier
    /// * `title` - Initial title
    /// * `model` - Default model tier name
    /// * `messages` - Initial transcript (e.g. a greeting message)
    ///
    /// # Returns
    ///
    /// The persisted conversation including its assigned id.
    pub fn create(
        &self,
        user_id: &str,
        title: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<Conversation> {
        let now = now_rfc3339();
        let conversation = Conversation {
            id: Ulid::new().to_string(),
            title: title.into(),
            messages,
            model: model.into(),
            created_at: now.clone(),
            updated_at: now,
        };

        self.write(user_id, &conversation)?;
        Ok(conversation)
    }

    /// Merge a patch into a stored conversation and stamp its update time
    ///
    /// Last write wins; there is no conflict detection.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The owning user's stable identifier
    /// * `conversation_id` - Which conversation to update
    /// * `patch` - The fields to replace
    ///
    /// # Returns
    ///
    /// The merged, persisted conversation.
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Storage` if the conversation does not exist
    /// or the write fails.
    pub fn upsert(
        &self,
        user_id: &str,
        conversation_id: &str,
        patch: ConversationPatch,
    ) -> Result<Conversation> {
        let tree = self.tree(user_id)?;
        let existing = tree
            .get(conversation_id.as_bytes())
            .map_err(|e| classify_store_error("Get failed", e))?
            .ok_or_else(|| {
                PolymodeError::Storage(format!("Conversation not found: {}", conversation_id))
            })?;

        let mut conversation: Conversation = serde_json::from_slice(&existing)
            .map_err(|e| PolymodeError::Storage(format!("Deserialization failed: {}", e)))?;

        if let Some(title) = patch.title {
            conversation.title = title;
        }
        if let Some(messages) = patch.messages {
            conversation.messages = messages;
        }
        if let Some(model) = patch.model {
            conversation.model = model;
        }
        conversation.updated_at = now_rfc3339();

        self.write(user_id, &conversation)?;
        Ok(conversation)
    }

    /// Fetch a single conversation by id
    pub fn get(&self, user_id: &str, conversation_id: &str) -> Result<Option<Conversation>> {
        let tree = self.tree(user_id)?;
        match tree
            .get(conversation_id.as_bytes())
            .map_err(|e| classify_store_error("Get failed", e))?
        {
            Some(bytes) => {
                let conversation = serde_json::from_slice(&bytes).map_err(|e| {
                    PolymodeError::Storage(format!("Deserialization failed: {}", e))
                })?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    fn write(&self, user_id: &str, conversation: &Conversation) -> Result<()> {
        let tree = self.tree(user_id)?;
        let value = serde_json::to_vec(conversation)
            .map_err(|e| PolymodeError::Storage(format!("Serialization failed: {}", e)))?;

        tree.insert(conversation.id.as_bytes(), value)
            .map_err(|e| classify_store_error("Insert failed", e))?;
        tree.flush()
            .map_err(|e| classify_store_error("Flush failed", e))?;
        Ok(())
    }

    fn tree(&self, user_id: &str) -> Result<sled::Tree> {
        self.db
            .open_tree(user_id.as_bytes())
            .map_err(|e| classify_store_error("Failed to open user tree", e).into())
    }
}

/// Translate a sled error into the store's error taxonomy
///
/// Access denials become `Permission` with remediation steps; everything
/// else becomes `Storage`.
fn classify_store_error(context: &str, err: sled::Error) -> PolymodeError {
    if let sled::Error::Io(ref io) = err {
        if io.kind() == std::io::ErrorKind::PermissionDenied {
            return PolymodeError::Permission {
                message: format!("{}: {}", context, err),
                remediation: PERMISSION_REMEDIATION.to_string(),
            };
        }
    }
    PolymodeError::Storage(format!("{}: {}", context, err))
}
