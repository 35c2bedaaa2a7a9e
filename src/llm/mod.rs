//! Boundary to the external chat-completion service.
//!
//! - `error`: error taxonomy for upstream calls
//! - `sse`: server-sent event decoding of streamed completions
//! - `groq`: reqwest-backed client for the Groq OpenAI-compatible API

pub mod error;
pub mod groq;
#[cfg(test)]
pub(crate) mod scripted;
pub mod sse;

pub use error::{LlmError, LlmResult};
pub use groq::GroqClient;
pub use sse::{SseDecoder, decode_fragments};

use std::future::Future;
use std::pin::Pin;

use futures::stream::{Stream, StreamExt};

use crate::conversation::Message;

/// Boxed future type for completion operations.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text fragments of a streamed completion, in delivery order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = LlmResult<String>> + Send>>;

/// Trait abstraction over streaming chat-completion services.
pub trait CompletionClient: Send + Sync {
    /// Start a completion over the full ordered message history.
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent or is rejected.
    fn stream_completion<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> CompletionFuture<'a, LlmResult<FragmentStream>>;
}

/// Drain a fragment stream, concatenating fragments in arrival order.
///
/// # Errors
/// Returns the first error yielded by the stream.
pub async fn collect_fragments(mut fragments: FragmentStream) -> LlmResult<String> {
    let mut reply = String::new();
    while let Some(fragment) = fragments.next().await {
        reply.push_str(&fragment?);
    }
    Ok(reply)
}
