//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::messages::MessageRecord;

/// Request to send a message to the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Conversation to continue (uses the default thread if not specified)
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Full history of a thread after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub thread_id: String,
    pub messages: Vec<MessageRecord>,
}

/// Stored history of a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub thread_id: String,
    pub messages: Vec<MessageRecord>,
}

/// Known threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub threads: Vec<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether conversations survive a restart
    pub persistent_store: bool,
}

/// Error body, `{"detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
