//! Conversation state kept in process memory.

pub mod message;
pub mod record;
pub mod store;

pub use message::{Message, ROLE_SYSTEM, ROLE_USER};
pub use record::{Conversation, SYSTEM_PROMPT};
pub use store::{ConversationHandle, ConversationStore};
