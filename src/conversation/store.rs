//! In-memory conversation store.
//!
//! Records live for the lifetime of the process. By default the store never
//! forgets a conversation, so memory grows with the number of distinct
//! identifiers seen. An optional capacity bound switches on least-recently-used
//! eviction.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use dashmap::DashMap;
use lru::LruCache;
use tokio::sync::Mutex;

use super::record::Conversation;

/// Shared handle to a stored conversation.
///
/// Holding the lock serializes turns within one conversation; other
/// conversations are unaffected.
pub type ConversationHandle = Arc<Mutex<Conversation>>;

/// Thread-safe mapping from conversation id to conversation record.
pub struct ConversationStore {
    conversations: DashMap<String, ConversationHandle>,
    recency: Option<StdMutex<LruCache<String, ()>>>,
}

impl ConversationStore {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
            recency: None,
        }
    }

    /// Create a store that keeps at most `max_conversations` records,
    /// evicting the least recently used one when a new id arrives.
    #[must_use]
    pub fn with_max_conversations(max_conversations: NonZeroUsize) -> Self {
        Self {
            conversations: DashMap::new(),
            recency: Some(StdMutex::new(LruCache::new(max_conversations))),
        }
    }

    /// Create a store from an optional capacity bound.
    #[must_use]
    pub fn from_limit(max_conversations: Option<NonZeroUsize>) -> Self {
        max_conversations.map_or_else(Self::new, Self::with_max_conversations)
    }

    /// Return the conversation stored under `id`, creating a fresh seeded one
    /// if the id has not been seen.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> ConversationHandle {
        let handle = self
            .conversations
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(conversation_id = id, "creating conversation");
                Arc::new(Mutex::new(Conversation::new()))
            })
            .value()
            .clone();

        self.touch(id);
        handle
    }

    /// Look up a conversation without creating it.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ConversationHandle> {
        self.conversations.get(id).map(|entry| entry.value().clone())
    }

    /// Close an existing conversation. Returns `false` if the id is unknown.
    pub async fn close(&self, id: &str) -> bool {
        let Some(handle) = self.get(id) else {
            return false;
        };
        handle.lock().await.close();
        tracing::info!(conversation_id = id, "conversation closed");
        true
    }

    /// Number of stored conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store holds no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn touch(&self, id: &str) {
        let Some(recency) = &self.recency else {
            return;
        };

        let displaced = {
            let mut order = recency.lock().unwrap_or_else(PoisonError::into_inner);
            if order.get(id).is_some() {
                return;
            }
            order.push(id.to_string(), ())
        };

        if let Some((evicted, ())) = displaced {
            if evicted != id {
                self.conversations.remove(&evicted);
                tracing::info!(conversation_id = %evicted, "evicted least recently used conversation");
            }
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
