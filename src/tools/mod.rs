//! Tools the agent can call.
//!
//! Every tool implements [`Tool`]; the agent loop only sees the
//! [`ToolRegistry`], which advertises [`ToolSpec`]s to the model and
//! dispatches calls by name.

mod tavily;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use tavily::{SearchTopic, TavilySearch, DEFAULT_TAVILY_BASE_URL};

/// Failure of a single tool invocation.
///
/// These never abort a run; the loop folds them into the conversation so
/// the model can react.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing '{0}' argument")]
    MissingArgument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Search credential rejected ({0})")]
    Unauthorized(u16),

    #[error("Rate limited by search provider")]
    RateLimited,

    #[error("Tool request timed out after {0} seconds")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from search provider: {0}")]
    InvalidResponse(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments
    pub parameters: Value,
}

/// A callable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing the accepted arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Ordered set of tools, looked up by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the web search tool.
    pub fn with_search(search: TavilySearch) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(search));
        registry
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Specs passed to the model on every completion.
    pub fn get_tool_schemas(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }
}

/// Render a tool's structured output as message content.
pub fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
