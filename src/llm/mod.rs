//! Language model access.
//!
//! The agent loop talks to a [`ModelClient`]. Tools are handed in on every
//! call rather than bound into the client, so one client can serve any
//! tool set.

mod ollama;

use async_trait::async_trait;
use thiserror::Error;

use crate::messages::{Message, ToolCall};
use crate::tools::ToolSpec;

pub use ollama::{OllamaClient, DEFAULT_OLLAMA_BASE_URL};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

/// What a completion can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantTurn {
    /// Final answer
    Text { content: String },
    /// Request to run one or more tools before answering
    ToolRequest {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
}

impl AssistantTurn {
    /// Build a turn, treating an empty call list as a final answer.
    pub fn new(content: String, tool_calls: Vec<ToolCall>) -> Self {
        if tool_calls.is_empty() {
            Self::Text { content }
        } else {
            Self::ToolRequest {
                content,
                tool_calls,
            }
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Self::Text { content } => Message::AssistantText { content },
            Self::ToolRequest {
                content,
                tool_calls,
            } => Message::AssistantToolRequest {
                content,
                tool_calls,
            },
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Complete the conversation, optionally requesting tool calls.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, ModelError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
