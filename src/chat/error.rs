//! Error types for chat turns.

use thiserror::Error;

use crate::llm::LlmError;

/// Detail text reported when a closed conversation receives a message.
pub const CONVERSATION_CLOSED_DETAIL: &str = "Conversation has ended.";

/// Failures of a single chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The conversation no longer accepts messages.
    #[error("Conversation has ended.")]
    ConversationClosed,
    /// The completion call failed; carries the upstream description.
    #[error("{0}")]
    Upstream(String),
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
