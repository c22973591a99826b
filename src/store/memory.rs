//! In-memory conversation store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConversationDocument, ConversationStore, StoreError};
use crate::messages::Message;

/// Keeps encoded documents in a map, so reads go through the same
/// serialization as the durable backend.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    documents: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<Message>, StoreError> {
        match self.documents.read().await.get(thread_id) {
            Some(raw) => ConversationDocument::decode(thread_id, raw),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, thread_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let raw = ConversationDocument::encode(messages)?;
        self.documents
            .write()
            .await
            .insert(thread_id.to_string(), raw);
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.documents.read().await.keys().cloned().collect())
    }
}
