//! Stub model and tools for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{AssistantTurn, ModelClient, ModelError};
use crate::messages::{Message, ToolCall};
use crate::tools::{Tool, ToolError, ToolSpec};

pub fn search_call(id: &str, query: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: "tavily_search".to_string(),
        arguments: json!({ "query": query }),
    }
}

/// Model that replays a fixed script of replies and records its inputs.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<AssistantTurn, ModelError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<AssistantTurn, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Answer every call with text, after a pause.
    pub fn answering_slowly(answers: usize, delay: Duration) -> Self {
        let script = (0..answers).map(|i| Self::text(&format!("answer {i}"))).collect();
        Self {
            delay: Some(delay),
            ..Self::new(script)
        }
    }

    pub fn text(content: &str) -> Result<AssistantTurn, ModelError> {
        Ok(AssistantTurn::Text {
            content: content.to_string(),
        })
    }

    pub fn tools(tool_calls: Vec<ToolCall>) -> Result<AssistantTurn, ModelError> {
        Ok(AssistantTurn::ToolRequest {
            content: String::new(),
            tool_calls,
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Messages passed on the `call`-th completion (zero based).
    pub fn seen_messages(&self, call: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<AssistantTurn, ModelError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Search stub answering `result-<query>`.
pub struct EchoSearch;

#[async_trait]
impl Tool for EchoSearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "stub search"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": { "query": { "type": "string" } } })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| ToolError::MissingArgument("query".to_string()))?;
        Ok(Value::String(format!("result-{query}")))
    }
}

/// Search stub that is always rate limited.
pub struct FailingSearch;

#[async_trait]
impl Tool for FailingSearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "stub search that fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        Err(ToolError::RateLimited)
    }
}
