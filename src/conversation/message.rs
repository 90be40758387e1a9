//! Message types for conversation transcripts
//!
//! A message is either a user turn or a model turn, and its payload is a
//! tagged variant so that illegal field combinations (e.g. a generated
//! image carrying grounding citations) are unrepresentable.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A turn written by the user
    User,
    /// A turn produced by the model
    Model,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// Citation fragment attached to a generated answer
///
/// Fragments arrive interleaved with streaming text chunks and are kept in
/// arrival order. Duplicates are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingChunk {
    /// Source title, when the backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Source URI, when the backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// User-supplied media reference riding on a user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    /// Attached image file
    Image {
        /// Local path to the file
        path: String,
        /// MIME type, e.g. "image/png"
        mime: String,
    },
    /// Attached video file
    Video {
        /// Local path to the file
        path: String,
        /// MIME type, e.g. "video/mp4"
        mime: String,
    },
    /// Captured audio artifact
    Audio {
        /// Local path to the file
        path: String,
        /// MIME type, e.g. "audio/wav"
        mime: String,
    },
}

/// Message payload, discriminated by what the turn carries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text turn, optionally with citations and user media
    Text {
        /// The turn text
        text: String,
        /// Citation fragments in arrival order (duplicates preserved)
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        grounding: Vec<GroundingChunk>,
        /// User-supplied media references
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
    },
    /// Generated image result
    Image {
        /// Caption shown with the image
        caption: String,
        /// Base64-encoded image payload
        data: String,
    },
    /// Generated video result, materialized locally
    Video {
        /// Caption shown with the video
        caption: String,
        /// Local path of the fetched video file
        path: String,
    },
    /// Generated source code result
    Code {
        /// Raw source text
        source: String,
    },
    /// A failed pathway attempt, retained in the transcript
    Error {
        /// Normalized error text
        message: String,
    },
}

/// One entry in a conversation transcript
///
/// Messages are append-only once written; a streaming update replaces the
/// message at the same `id`, never creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (ULID)
    pub id: String,

    /// Author role
    pub role: Role,

    /// Creation timestamp (RFC-3339)
    pub created_at: String,

    /// The message payload
    pub body: MessageBody,
}

impl Message {
    /// Create a message with a fresh id and current timestamp
    pub fn new(role: Role, body: MessageBody) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role,
            created_at: now_rfc3339(),
            body,
        }
    }

    /// Create a user text turn, optionally carrying media attachments
    ///
    /// # Examples
    ///
    /// ```
    /// use polymode::conversation::message::{Message, Role};
    ///
    /// let msg = Message::user_text("draw a cat", vec![]);
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text(), Some("draw a cat"));
    /// ```
    pub fn user_text(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self::new(
            Role::User,
            MessageBody::Text {
                text: text.into(),
                grounding: Vec::new(),
                attachments,
            },
        )
    }

    /// Create a model text turn
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(
            Role::Model,
            MessageBody::Text {
                text: text.into(),
                grounding: Vec::new(),
                attachments: Vec::new(),
            },
        )
    }

    /// Create the pending-response placeholder appended at stream start
    pub fn placeholder() -> Self {
        Self::model_text("...")
    }

    /// Create a model-role error message
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            Role::Model,
            MessageBody::Error {
                message: message.into(),
            },
        )
    }

    /// The text a turn contributes to chat history, if any
    ///
    /// Text turns contribute their text; generated image and video turns
    /// contribute their caption; code and error turns contribute nothing.
    pub fn transcript_text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { text, .. } => Some(text),
            MessageBody::Image { caption, .. } | MessageBody::Video { caption, .. } => {
                Some(caption)
            }
            MessageBody::Code { .. } | MessageBody::Error { .. } => None,
        }
    }

    /// The plain text of a text-bodied turn, if any
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Whether this message records a failed pathway attempt
    pub fn is_error(&self) -> bool {
        matches!(self.body, MessageBody::Error { .. })
    }
}

/// Get current timestamp in RFC-3339 format
///
/// Used consistently for all message and conversation timestamps.
///
/// # Examples
///
/// ```
/// use polymode::conversation::message::now_rfc3339;
///
/// let timestamp = now_rfc3339();
/// assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
/// ```
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
