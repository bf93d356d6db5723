//! Per-user conversation history
//!
//! Each learner has one bounded sequence of turns. The first turn is the
//! system prompt and survives every truncation. Storage sits behind
//! `ConversationStore` so the in-memory map can later be swapped for an
//! external store without touching the tutor.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub use crate::types::{Message, Role};

/// Default history cap, system turn included
pub const DEFAULT_MAX_TURNS: usize = 20;

/// One learner's conversation
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Insert the system turn if the conversation has not started yet
    pub fn seed(&mut self, system: Message) {
        if self.messages.is_empty() {
            self.add_message(system);
        }
    }

    /// Collapse to the first turn plus the most recent `max_turns - 1`
    pub fn truncate(&mut self, max_turns: usize) {
        truncate_history(&mut self.messages, max_turns);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

/// Cap `history` at `max_turns`, always keeping index 0.
///
/// A cap below 1 is treated as 1.
pub fn truncate_history(history: &mut Vec<Message>, max_turns: usize) {
    let max_turns = max_turns.max(1);
    if history.len() <= max_turns {
        return;
    }
    let drop_end = history.len() - (max_turns - 1);
    history.drain(1..drop_end);
}

/// Storage for conversation histories keyed by user id
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// A user's conversation, empty if none was saved yet
    async fn load(&self, user_id: &str) -> Conversation;

    /// Replace a user's conversation
    async fn save(&self, user_id: &str, conversation: Conversation);

    /// Forget a user's conversation; returns whether one existed
    async fn remove(&self, user_id: &str) -> bool;

    /// Users with a saved conversation
    async fn users(&self) -> Vec<String>;
}

/// Process-lifetime conversation store; nothing survives a restart
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_id: &str) -> Conversation {
        self.conversations
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn save(&self, user_id: &str, conversation: Conversation) {
        self.conversations
            .write()
            .await
            .insert(user_id.to_string(), conversation);
    }

    async fn remove(&self, user_id: &str) -> bool {
        self.conversations.write().await.remove(user_id).is_some()
    }

    async fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        users.sort();
        users
    }
}
