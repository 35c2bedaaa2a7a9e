//! Role-tagged chat messages.

use serde::{Deserialize, Serialize};

/// Role tag for the seed instruction and for generated replies.
pub const ROLE_SYSTEM: &str = "system";
/// Role tag applied to inbound messages when the caller omits one.
pub const ROLE_USER: &str = "user";

/// A single entry of a conversation.
///
/// The role is an open set of tags, so it stays a plain string rather than an enum:
/// whatever the caller sends is forwarded upstream as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role tag (`system`, `user`, `assistant`, ...).
    pub role: String,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Create a message with an arbitrary role.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a `system`-tagged message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ROLE_SYSTEM, content)
    }

    /// Create a `user`-tagged message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ROLE_USER, content)
    }
}
