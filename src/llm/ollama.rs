//! Ollama chat client (`POST /api/chat`).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{AssistantTurn, ModelClient, ModelError};
use crate::messages::{find_tool_call, Message, ToolCall};
use crate::tools::ToolSpec;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://host.docker.internal:11434";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    r#type: &'static str,
    function: &'a ToolSpec,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            timeout,
        })
    }
}

/// Map conversation history onto Ollama chat messages.
fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| match message {
            Message::Human { content } => ChatMessage {
                role: Role::User,
                content: content.clone(),
                tool_calls: Vec::new(),
                tool_name: None,
            },
            Message::AssistantText { content } => ChatMessage {
                role: Role::Assistant,
                content: content.clone(),
                tool_calls: Vec::new(),
                tool_name: None,
            },
            Message::AssistantToolRequest {
                content,
                tool_calls,
            } => ChatMessage {
                role: Role::Assistant,
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: Some(call.id.clone()),
                        function: WireFunction {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_name: None,
            },
            Message::ToolResult {
                tool_call_id,
                content,
            } => ChatMessage {
                role: Role::Tool,
                content: content.clone(),
                tool_calls: Vec::new(),
                tool_name: find_tool_call(messages, index, tool_call_id)
                    .map(|call| call.name.clone()),
            },
        })
        .collect()
}

/// Convert a wire call, giving it a fresh id when the server sent none or
/// one already used in this conversation.
fn from_wire_call(call: WireToolCall, taken: &mut HashSet<String>) -> ToolCall {
    // Some servers send arguments as a JSON-encoded string.
    let arguments = match call.function.arguments {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    let id = match call.id.filter(|id| !id.is_empty()) {
        Some(id) if !taken.contains(&id) => id,
        _ => format!("call_{}", Uuid::new_v4().simple()),
    };
    taken.insert(id.clone());
    ToolCall {
        id,
        name: call.function.name,
        arguments,
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, ModelError> {
        let request = ChatRequest {
            model: &self.model,
            messages: to_chat_messages(messages),
            tools: tools
                .iter()
                .map(|spec| ToolDefinition {
                    r#type: "function",
                    function: spec,
                })
                .collect(),
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Requesting chat completion"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.timeout.as_secs())
                } else {
                    ModelError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        if parsed.message.role != Role::Assistant {
            return Err(ModelError::InvalidResponse(format!(
                "expected assistant message, got {:?}",
                parsed.message.role
            )));
        }

        let mut taken: HashSet<String> = messages
            .iter()
            .filter_map(|message| match message {
                Message::AssistantToolRequest { tool_calls, .. } => Some(tool_calls),
                _ => None,
            })
            .flatten()
            .map(|call| call.id.clone())
            .collect();
        let tool_calls = parsed
            .message
            .tool_calls
            .into_iter()
            .map(|call| from_wire_call(call, &mut taken))
            .collect();

        Ok(AssistantTurn::new(parsed.message.content, tool_calls))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::validate_tool_linkage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OllamaClient {
        OllamaClient::new(server.uri(), "qwen3:1.7b", 0.0, Duration::from_secs(5))
            .expect("build client")
    }

    fn search_spec() -> ToolSpec {
        ToolSpec {
            name: "tavily_search".to_string(),
            description: "search".to_string(),
            parameters: json!({ "type": "object" }),
        }
    }

    #[tokio::test]
    async fn plain_answer_becomes_text_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "qwen3:1.7b",
                "stream": false,
                "options": { "temperature": 0.0 },
                "messages": [{ "role": "user", "content": "What is the capital of France?" }],
                "tools": [{ "type": "function", "function": { "name": "tavily_search" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "qwen3:1.7b",
                "message": { "role": "assistant", "content": "Paris" },
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let turn = client(&server)
            .complete(&[Message::human("What is the capital of France?")], &[search_spec()])
            .await
            .expect("completion");
        assert_eq!(
            turn,
            AssistantTurn::Text {
                content: "Paris".to_string()
            }
        );
    }

    #[tokio::test]
    async fn tool_calls_get_ids_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        { "function": { "name": "tavily_search", "arguments": { "query": "X" } } },
                        { "id": "given", "function": { "name": "tavily_search", "arguments": "{\"query\":\"Y\"}" } }
                    ]
                },
                "done": true
            })))
            .mount(&server)
            .await;

        let turn = client(&server)
            .complete(&[Message::human("q")], &[search_spec()])
            .await
            .expect("completion");

        let AssistantTurn::ToolRequest { tool_calls, .. } = turn else {
            panic!("expected tool request, got {:?}", turn);
        };
        assert_eq!(tool_calls.len(), 2);
        assert!(tool_calls[0].id.starts_with("call_"));
        assert_eq!(tool_calls[0].arguments, json!({ "query": "X" }));
        assert_eq!(tool_calls[1].id, "given");
        assert_eq!(tool_calls[1].arguments, json!({ "query": "Y" }));
    }

    #[tokio::test]
    async fn repeated_call_ids_are_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        { "id": "call_0", "function": { "name": "tavily_search", "arguments": { "query": "X" } } },
                        { "id": "call_0", "function": { "name": "tavily_search", "arguments": { "query": "Y" } } },
                        { "id": "c1", "function": { "name": "tavily_search", "arguments": { "query": "Z" } } }
                    ]
                },
                "done": true
            })))
            .mount(&server)
            .await;

        // "c1" was already answered earlier in the thread.
        let history = vec![
            Message::human("q"),
            Message::tool_request(
                "",
                vec![ToolCall {
                    id: "c1".to_string(),
                    name: "tavily_search".to_string(),
                    arguments: json!({ "query": "earlier" }),
                }],
            ),
            Message::tool_result("c1", "result"),
        ];

        let turn = client(&server)
            .complete(&history, &[search_spec()])
            .await
            .expect("completion");

        let AssistantTurn::ToolRequest { tool_calls, .. } = turn else {
            panic!("expected tool request, got {:?}", turn);
        };
        let ids: Vec<&str> = tool_calls.iter().map(|call| call.id.as_str()).collect();
        assert_eq!(ids[0], "call_0");
        assert_ne!(ids[1], "call_0");
        assert!(ids[1].starts_with("call_"));
        assert_ne!(ids[2], "c1");
        assert_eq!(tool_calls[1].arguments, json!({ "query": "Y" }));

        let mut full = history;
        full.push(Message::tool_request("", tool_calls.clone()));
        for call in &tool_calls {
            full.push(Message::tool_result(call.id.clone(), "ok"));
        }
        assert!(validate_tool_linkage(&full).is_ok());
    }

    #[tokio::test]
    async fn server_error_is_a_model_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&[Message::human("q")], &[])
            .await
            .expect_err("server error");
        assert!(matches!(err, ModelError::Status { status: 500, ref body } if body == "model not loaded"));
    }

    #[test]
    fn tool_results_carry_the_tool_name() {
        let history = vec![
            Message::human("q"),
            Message::tool_request(
                "",
                vec![ToolCall {
                    id: "c1".to_string(),
                    name: "tavily_search".to_string(),
                    arguments: json!({ "query": "q" }),
                }],
            ),
            Message::tool_result("c1", "result"),
        ];

        let wire = serde_json::to_value(to_chat_messages(&history)).expect("serialize");
        assert_eq!(
            wire,
            json!([
                { "role": "user", "content": "q" },
                {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{ "id": "c1", "function": { "name": "tavily_search", "arguments": { "query": "q" } } }]
                },
                { "role": "tool", "content": "result", "tool_name": "tavily_search" }
            ])
        );
    }
}
