//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::RelayConfig;
use crate::conversation::ConversationStore;
use crate::llm::{CompletionClient, GroqClient, LlmResult};

/// Shared application state.
pub struct AppState {
    /// Chat turn handler, owning the conversation store.
    pub chat: ChatService,
    /// Model name reported by the health endpoint.
    pub model_name: String,
}

impl AppState {
    /// Wrap an already-built chat service.
    #[must_use]
    pub fn new(chat: ChatService, model_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            chat,
            model_name: model_name.into(),
        })
    }

    /// Build the production state: empty store plus a Groq client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &RelayConfig) -> LlmResult<Arc<Self>> {
        let store = Arc::new(ConversationStore::from_limit(config.max_conversations));
        let groq = GroqClient::new(config.upstream.clone())?;
        let model_name = groq.model().to_string();
        let client: Arc<dyn CompletionClient> = Arc::new(groq);
        let chat = ChatService::new(store, client, config.upstream.timeout);

        Ok(Self::new(chat, model_name))
    }
}
