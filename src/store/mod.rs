//! Conversation persistence.
//!
//! A thread's history is stored as one document under the fixed
//! [`NAMESPACE`] and its `thread_id`:
//!
//! ```json
//! {"messages": [{"type": "human", "data": {"content": "..."}}, ...]}
//! ```
//!
//! `save` always replaces the whole document. Backends must make that
//! replacement atomic per thread, since other processes may share the
//! same backing store.

mod memory;
mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{messages_from_records, messages_to_records, Message, MessageRecord};

pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;

/// Top-level tag for every stored conversation.
pub const NAMESPACE: &str = "conversation";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to encode conversation: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored conversation {thread_id} is corrupt: {reason}")]
    Corrupt { thread_id: String, reason: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Persisted form of a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDocument {
    pub messages: Vec<MessageRecord>,
}

impl ConversationDocument {
    pub fn encode(messages: &[Message]) -> Result<String, StoreError> {
        let document = Self {
            messages: messages_to_records(messages),
        };
        Ok(serde_json::to_string(&document)?)
    }

    pub fn decode(thread_id: &str, raw: &str) -> Result<Vec<Message>, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            thread_id: thread_id.to_string(),
            reason,
        };
        let document: Self = serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;
        messages_from_records(document.messages).map_err(|e| corrupt(e.to_string()))
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Whether conversations survive a restart.
    fn is_persistent(&self) -> bool;

    /// History of a thread; empty if the thread is unknown.
    async fn load(&self, thread_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Replace the full history of a thread.
    async fn save(&self, thread_id: &str, messages: &[Message]) -> Result<(), StoreError>;

    /// Every known thread id, in no particular order.
    async fn list_threads(&self) -> Result<Vec<String>, StoreError>;
}

/// Which backend holds conversations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Sqlite { path: PathBuf },
}

pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>, StoreError> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory conversation store; history is lost on restart");
            Ok(Arc::new(InMemoryConversationStore::new()))
        }
        StoreConfig::Sqlite { path } => {
            tracing::info!("Opening conversation store at {}", path.display());
            Ok(Arc::new(SqliteConversationStore::open(path)?))
        }
    }
}
