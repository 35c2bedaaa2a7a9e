//! Chat turn handling: append, complete, append.

use std::sync::Arc;
use std::time::Duration;

use crate::conversation::{ConversationStore, Message, ROLE_USER};
use crate::llm::{CompletionClient, LlmError, LlmResult, collect_fragments};

use super::error::{ChatError, ChatResult};

/// One inbound chat message.
#[derive(Clone, Debug)]
pub struct ChatInput {
    /// Message text, forwarded as-is.
    pub message: String,
    /// Role tag for the appended message.
    pub role: String,
    /// Conversation key.
    pub conversation_id: String,
}

impl ChatInput {
    /// Create a `user`-tagged input.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            role: ROLE_USER.to_string(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Override the role tag.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

/// Result of a successful turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatReply {
    /// Generated reply text.
    pub response: String,
    /// Echo of the conversation key.
    pub conversation_id: String,
}

/// Runs chat turns against a conversation store and a completion client.
pub struct ChatService {
    store: Arc<ConversationStore>,
    client: Arc<dyn CompletionClient>,
    upstream_timeout: Duration,
}

impl ChatService {
    /// Create a chat service.
    #[must_use]
    pub fn new(
        store: Arc<ConversationStore>,
        client: Arc<dyn CompletionClient>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            store,
            client,
            upstream_timeout,
        }
    }

    /// Conversation store backing this service.
    #[must_use]
    pub const fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Run one turn.
    ///
    /// The conversation stays locked for the whole turn, so concurrent turns on
    /// the same id run one after the other. When the upstream call fails, the
    /// inbound message stays in the history.
    ///
    /// # Errors
    /// Returns [`ChatError::ConversationClosed`] if the conversation was closed,
    /// or [`ChatError::Upstream`] if the completion call fails or times out.
    pub async fn handle_chat(&self, input: ChatInput) -> ChatResult<ChatReply> {
        let handle = self.store.get_or_create(&input.conversation_id);
        let mut conversation = handle.lock().await;

        if !conversation.is_active() {
            tracing::debug!(
                conversation_id = %input.conversation_id,
                "rejecting message for closed conversation"
            );
            return Err(ChatError::ConversationClosed);
        }

        conversation.push(Message::new(input.role, input.message));

        let reply = match self.complete(conversation.messages()).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    conversation_id = %input.conversation_id,
                    error = %err,
                    "completion failed"
                );
                return Err(err.into());
            }
        };

        conversation.push(Message::system(reply.clone()));
        tracing::debug!(
            conversation_id = %input.conversation_id,
            messages = conversation.messages().len(),
            "turn complete"
        );

        Ok(ChatReply {
            response: reply,
            conversation_id: input.conversation_id,
        })
    }

    async fn complete(&self, messages: &[Message]) -> LlmResult<String> {
        let call = async {
            let fragments = self.client.stream_completion(messages).await?;
            collect_fragments(fragments).await
        };

        tokio::time::timeout(self.upstream_timeout, call)
            .await
            .map_err(|_| LlmError::Timeout(self.upstream_timeout))?
    }
}
