//! Session and Turn domain types.
//!
//! These are the core value objects that flow through the entire system:
//! a caller opens a Session → sends a ChatTurnRequest → the orchestrator
//! appends the resulting Turns to the session's conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model's response
    Assistant,
    /// System instructions (synthesized into history, never stored in the log)
    System,
    /// Tool output logged into the conversation
    Tool,
}

/// A single turn in a session's conversation log. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn was appended
    pub timestamp: DateTime<Utc>,

    /// For `Role::Tool` turns, which tool produced the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            tool_name: None,
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            tool_name: None,
        }
    }

    /// Create a synthetic system turn (used by `history`, never appended).
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            timestamp: Utc::now(),
            tool_name: None,
        }
    }

    /// Create a tool turn carrying a tool's output.
    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            timestamp: Utc::now(),
            tool_name: Some(tool_name.into()),
        }
    }

    /// Size of this turn in characters, as counted by budgets.
    pub fn chars(&self) -> usize {
        self.content.len()
    }
}

/// One chat turn request, as received from the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    /// Must reference a live session or the turn fails with `SessionNotFound`.
    pub session_id: SessionId,

    /// The user's message for this turn.
    pub message: String,

    /// Whether web-class tools may run before generation.
    #[serde(default)]
    pub use_web_search: bool,

    /// Whether the session's retrieval index should be queried.
    #[serde(default)]
    pub use_rag: bool,
}

impl ChatTurnRequest {
    pub fn new(session_id: SessionId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            message: message.into(),
            use_web_search: false,
            use_rag: false,
        }
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.use_web_search = enabled;
        self
    }

    pub fn with_rag(mut self, enabled: bool) -> Self {
        self.use_rag = enabled;
        self
    }
}
