//! Chat turns: resolve the conversation, call upstream, record the reply.

pub mod error;
pub mod service;

pub use error::{CONVERSATION_CLOSED_DETAIL, ChatError, ChatResult};
pub use service::{ChatInput, ChatReply, ChatService};
