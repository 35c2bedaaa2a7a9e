//! Conversation record: seeded history plus the active flag.

use chrono::{DateTime, Utc};

use super::message::Message;

/// Instruction every conversation starts with.
pub const SYSTEM_PROMPT: &str = "You are a useful AI assistant.";

/// Ordered, append-only message history with an open/closed flag.
#[derive(Clone, Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an active conversation seeded with [`SYSTEM_PROMPT`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: vec![Message::system(SYSTEM_PROMPT)],
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Messages in insertion order. Never empty.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message to the end of the history.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Whether the conversation still accepts messages.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Close the conversation. There is no way to reopen it.
    pub const fn close(&mut self) {
        self.active = false;
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
