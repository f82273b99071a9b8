//! `ChatStore` trait: async interface for conversation persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::llm::ChatMessage;

/// Conversation histories keyed by thread key.
///
/// A history is stored and replaced as a whole; callers own ordering.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Load the history for `chat_id`, if one has been saved.
    async fn load_thread(&self, chat_id: &str) -> Result<Option<Vec<ChatMessage>>, DatabaseError>;

    /// Insert or replace the history for `chat_id`.
    async fn save_thread(&self, chat_id: &str, thread: &[ChatMessage]) -> Result<(), DatabaseError>;

    /// Remove a history. Returns whether one existed.
    async fn delete_thread(&self, chat_id: &str) -> Result<bool, DatabaseError>;
}
