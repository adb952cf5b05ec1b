//! Conversation transcript
//!
//! The transcript is append-only: messages are never reordered, edited or
//! removed for the lifetime of one conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic message identifier, unique within one transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "you",
            Role::Assistant => "jarvis",
        }
    }
}

/// A single transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only message log
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
    #[serde(skip)]
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a copy of the stored entry
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Message {
        self.next_id += 1;
        let message = Message {
            id: MessageId(self.next_id),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
