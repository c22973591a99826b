//! Core agent loop implementation.
//!
//! A small state machine:
//!
//! ```text
//! AwaitingModel --text--> Done
//! AwaitingModel --tool request--> AwaitingToolResults --results--> AwaitingModel
//! ```
//!
//! Each model call is one round. The loop gives up with
//! [`AgentError::LoopExceeded`] once `max_rounds` model calls have been
//! made without a final answer.

use std::sync::Arc;

use crate::llm::{AssistantTurn, ModelClient};
use crate::messages::{Message, ToolCall};
use crate::tools::{render_output, ToolRegistry};

use super::AgentError;

/// Working state threaded through one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopState {
    pub messages: Vec<Message>,
}

impl LoopState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Where the loop is.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopPhase {
    AwaitingModel,
    /// Calls from the latest tool request, still to be executed
    AwaitingToolResults(Vec<ToolCall>),
    Done,
}

/// Final state plus the number of model calls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub state: LoopState,
    pub rounds: usize,
}

/// Alternates between the model and the tools until the model answers.
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
}

impl AgentLoop {
    /// `max_rounds` is clamped to at least one model call.
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, max_rounds: usize) -> Self {
        Self {
            model,
            tools,
            max_rounds: max_rounds.max(1),
        }
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Drive the state machine to `Done`.
    pub async fn run(&self, mut state: LoopState) -> Result<LoopOutcome, AgentError> {
        let tool_schemas = self.tools.get_tool_schemas();
        let mut phase = LoopPhase::AwaitingModel;
        let mut rounds = 0;

        loop {
            phase = match phase {
                LoopPhase::AwaitingModel => {
                    if rounds >= self.max_rounds {
                        tracing::warn!(
                            max_rounds = self.max_rounds,
                            "Agent loop exceeded round limit"
                        );
                        return Err(AgentError::LoopExceeded {
                            max_rounds: self.max_rounds,
                        });
                    }
                    rounds += 1;
                    tracing::debug!(
                        round = rounds,
                        model = %self.model.model_name(),
                        "Agent round"
                    );

                    let turn = self.model.complete(&state.messages, &tool_schemas).await?;
                    let next = match &turn {
                        AssistantTurn::Text { .. } => LoopPhase::Done,
                        AssistantTurn::ToolRequest { tool_calls, .. } => {
                            LoopPhase::AwaitingToolResults(tool_calls.clone())
                        }
                    };
                    state.messages.push(turn.into_message());
                    next
                }
                LoopPhase::AwaitingToolResults(calls) => {
                    for call in &calls {
                        let content = self.execute_tool_call(call).await;
                        state
                            .messages
                            .push(Message::tool_result(call.id.clone(), content));
                    }
                    LoopPhase::AwaitingModel
                }
                LoopPhase::Done => {
                    tracing::debug!(rounds, "Agent loop finished");
                    return Ok(LoopOutcome { state, rounds });
                }
            };
        }
    }

    /// Run one tool call. Failures become the result content.
    async fn execute_tool_call(&self, call: &ToolCall) -> String {
        tracing::info!(tool = %call.name, call_id = %call.id, "Calling tool");

        match self.tools.execute(&call.name, call.arguments.clone()).await {
            Ok(output) => render_output(&output),
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                format!("Error: {}", e)
            }
        }
    }
}
