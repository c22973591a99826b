//! Conversation messages and their portable record form.
//!
//! A [`Message`] is one turn in a thread. On the wire and in storage it is
//! encoded as a [`MessageRecord`]:
//!
//! ```json
//! {"type": "ai", "data": {"content": "", "tool_calls": [{"id": "c1", "name": "tavily_search", "arguments": {"query": "X"}}]}}
//! ```
//!
//! Optional fields (`tool_calls`, `tool_call_id`) are only written when
//! they carry a value, so stored records stay compact and diffable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("tool message is missing tool_call_id")]
    MissingToolCallId,

    #[error("tool result references unknown tool_call_id: {0}")]
    UnlinkedToolResult(String),

    #[error("tool_call_id {0} was requested more than once")]
    AmbiguousToolCallId(String),
}

/// A request from the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, unique within one assistant response
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Structured arguments
    pub arguments: Value,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MessageRecord", try_from = "MessageRecord")]
pub enum Message {
    /// User input
    Human { content: String },
    /// Final assistant answer, no pending tool calls
    AssistantText { content: String },
    /// Assistant turn asking for one or more tool invocations
    AssistantToolRequest {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    /// Output of a tool call, linked to the request by id
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::AssistantText {
            content: content.into(),
        }
    }

    /// Assistant turn requesting `tool_calls`. With no calls this is a
    /// plain [`Message::AssistantText`], the same value its record decodes to.
    pub fn tool_request(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        if tool_calls.is_empty() {
            return Self::AssistantText {
                content: content.into(),
            };
        }
        Self::AssistantToolRequest {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Text content of the message.
    pub fn content(&self) -> &str {
        match self {
            Self::Human { content }
            | Self::AssistantText { content }
            | Self::AssistantToolRequest { content, .. }
            | Self::ToolResult { content, .. } => content,
        }
    }

    /// Record tag for this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Human { .. } => MessageKind::Human,
            Self::AssistantText { .. } | Self::AssistantToolRequest { .. } => MessageKind::Ai,
            Self::ToolResult { .. } => MessageKind::Tool,
        }
    }
}

/// Record tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Human,
    Ai,
    Tool,
}

/// Portable, serialized form of a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: MessageData,
}

/// Payload of a [`MessageRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        let kind = message.kind();
        let data = match message {
            Message::Human { content } | Message::AssistantText { content } => MessageData {
                content,
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
            Message::AssistantToolRequest {
                content,
                tool_calls,
            } => MessageData {
                content,
                tool_calls,
                tool_call_id: None,
            },
            Message::ToolResult {
                tool_call_id,
                content,
            } => MessageData {
                content,
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_call_id),
            },
        };
        Self { kind, data }
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = MessageError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let MessageData {
            content,
            tool_calls,
            tool_call_id,
        } = record.data;

        match record.kind {
            MessageKind::Human => Ok(Self::Human { content }),
            MessageKind::Ai if tool_calls.is_empty() => Ok(Self::AssistantText { content }),
            MessageKind::Ai => Ok(Self::AssistantToolRequest {
                content,
                tool_calls,
            }),
            MessageKind::Tool => {
                let tool_call_id = tool_call_id.ok_or(MessageError::MissingToolCallId)?;
                Ok(Self::ToolResult {
                    tool_call_id,
                    content,
                })
            }
        }
    }
}

/// Serialize a message into its portable record.
pub fn serialize(message: &Message) -> MessageRecord {
    MessageRecord::from(message.clone())
}

/// Rebuild a message from its portable record.
pub fn deserialize(record: MessageRecord) -> Result<Message, MessageError> {
    Message::try_from(record)
}

pub fn messages_to_records(messages: &[Message]) -> Vec<MessageRecord> {
    messages.iter().map(serialize).collect()
}

pub fn messages_from_records(records: Vec<MessageRecord>) -> Result<Vec<Message>, MessageError> {
    records.into_iter().map(deserialize).collect()
}

/// Check that every tool result answers exactly one tool call made earlier
/// in the sequence.
pub fn validate_tool_linkage(messages: &[Message]) -> Result<(), MessageError> {
    let mut requested: HashMap<&str, usize> = HashMap::new();
    for message in messages {
        match message {
            Message::AssistantToolRequest { tool_calls, .. } => {
                for call in tool_calls {
                    *requested.entry(call.id.as_str()).or_default() += 1;
                }
            }
            Message::ToolResult { tool_call_id, .. } => {
                match requested.get(tool_call_id.as_str()).copied() {
                    Some(1) => {}
                    Some(_) => return Err(MessageError::AmbiguousToolCallId(tool_call_id.clone())),
                    None => return Err(MessageError::UnlinkedToolResult(tool_call_id.clone())),
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Find the tool call a result answers, scanning backwards from `before`.
pub fn find_tool_call<'a>(
    messages: &'a [Message],
    before: usize,
    tool_call_id: &str,
) -> Option<&'a ToolCall> {
    messages[..before.min(messages.len())]
        .iter()
        .rev()
        .find_map(|message| match message {
            Message::AssistantToolRequest { tool_calls, .. } => {
                tool_calls.iter().find(|call| call.id == tool_call_id)
            }
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_call(id: &str, query: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "tavily_search".to_string(),
            arguments: json!({ "query": query }),
        }
    }

    #[test]
    fn every_variant_survives_record_round_trip() {
        let messages = vec![
            Message::human("What is the capital of France?"),
            Message::tool_request("", vec![search_call("c1", "capital of France")]),
            Message::tool_result("c1", "Paris is the capital of France."),
            Message::assistant("Paris"),
        ];

        for message in messages {
            let record = serialize(&message);
            assert_eq!(deserialize(record).expect("deserialize"), message);
        }
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let value = serde_json::to_value(Message::human("hi")).expect("serialize");
        assert_eq!(value, json!({ "type": "human", "data": { "content": "hi" } }));

        let value = serde_json::to_value(Message::assistant("Paris")).expect("serialize");
        assert_eq!(value, json!({ "type": "ai", "data": { "content": "Paris" } }));
    }

    #[test]
    fn tool_fields_are_written_when_present() {
        let request = Message::tool_request("looking", vec![search_call("c1", "X")]);
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({
                "type": "ai",
                "data": {
                    "content": "looking",
                    "tool_calls": [{ "id": "c1", "name": "tavily_search", "arguments": { "query": "X" } }]
                }
            })
        );

        let result = serde_json::to_value(Message::tool_result("c1", "result-X")).expect("serialize");
        assert_eq!(
            result,
            json!({ "type": "tool", "data": { "content": "result-X", "tool_call_id": "c1" } })
        );
    }

    #[test]
    fn ai_record_with_empty_tool_calls_is_a_text_answer() {
        let message: Message = serde_json::from_value(json!({
            "type": "ai",
            "data": { "content": "done", "tool_calls": [] }
        }))
        .expect("deserialize");
        assert_eq!(message, Message::assistant("done"));
    }

    #[test]
    fn tool_record_without_call_id_is_rejected() {
        let record: MessageRecord = serde_json::from_value(json!({
            "type": "tool",
            "data": { "content": "orphan" }
        }))
        .expect("record parses");
        assert_eq!(deserialize(record), Err(MessageError::MissingToolCallId));

        let parsed = serde_json::from_value::<Message>(json!({
            "type": "tool",
            "data": { "content": "orphan" }
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn linkage_requires_an_earlier_request() {
        let linked = vec![
            Message::human("q"),
            Message::tool_request("", vec![search_call("c1", "q"), search_call("c2", "q2")]),
            Message::tool_result("c1", "a"),
            Message::tool_result("c2", "b"),
        ];
        assert!(validate_tool_linkage(&linked).is_ok());

        let unlinked = vec![Message::human("q"), Message::tool_result("c9", "a")];
        assert_eq!(
            validate_tool_linkage(&unlinked),
            Err(MessageError::UnlinkedToolResult("c9".to_string()))
        );
    }

    #[test]
    fn linkage_rejects_repeated_call_ids() {
        let within_one_request = vec![
            Message::human("q"),
            Message::tool_request("", vec![search_call("call_0", "X"), search_call("call_0", "Y")]),
            Message::tool_result("call_0", "a"),
            Message::tool_result("call_0", "b"),
        ];
        assert_eq!(
            validate_tool_linkage(&within_one_request),
            Err(MessageError::AmbiguousToolCallId("call_0".to_string()))
        );

        let across_requests = vec![
            Message::human("q"),
            Message::tool_request("", vec![search_call("c1", "X")]),
            Message::tool_result("c1", "a"),
            Message::tool_request("", vec![search_call("c1", "Y")]),
            Message::tool_result("c1", "b"),
        ];
        assert_eq!(
            validate_tool_linkage(&across_requests),
            Err(MessageError::AmbiguousToolCallId("c1".to_string()))
        );
    }

    #[test]
    fn tool_request_without_calls_is_a_text_answer() {
        let message = Message::tool_request("done", Vec::new());
        assert_eq!(message, Message::assistant("done"));
        assert_eq!(deserialize(serialize(&message)).expect("deserialize"), message);
    }

    #[test]
    fn find_tool_call_scans_only_earlier_messages() {
        let messages = vec![
            Message::tool_request("", vec![search_call("c1", "q")]),
            Message::tool_result("c1", "a"),
        ];
        let call = find_tool_call(&messages, 1, "c1").expect("call found");
        assert_eq!(call.name, "tavily_search");
        assert!(find_tool_call(&messages, 0, "c1").is_none());
    }
}
