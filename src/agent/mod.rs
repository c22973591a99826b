//! Agent module - the core conversational search agent.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Load the thread's history and append the user's message
//! 2. Call the model with the available tools
//! 3. If the model requests tool calls, execute them and feed results back
//! 4. Repeat until the model answers or the round limit is reached
//! 5. Persist the updated history

mod agent_loop;
mod search_agent;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::llm::ModelError;
use crate::store::StoreError;

pub use agent_loop::{AgentLoop, LoopOutcome, LoopPhase, LoopState};
pub use search_agent::{SearchAgent, DEFAULT_THREAD_ID};

/// Errors that end a run.
///
/// Tool failures are not here: they are folded into the conversation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Agent exceeded {max_rounds} model rounds without a final answer")]
    LoopExceeded { max_rounds: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
