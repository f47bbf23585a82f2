//! Shared types for LLM providers

use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool invocations requested by the model (assistant turns only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Assistant turn that only carries tool calls
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: calls,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// A tool call from the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Definition of a tool for the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Sampling options forwarded to the model server
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1024,
        }
    }
}

impl From<&crate::config::LlmConfig> for ChatOptions {
    fn from(config: &crate::config::LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }
}

/// Response from an LLM
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    /// Plain text response
    Text { text: String },
    /// Tool calls requested by the model
    ToolCalls { calls: Vec<ToolCall> },
}

impl LlmResponse {
    pub fn text(&self) -> Option<&str> {
        match self {
            LlmResponse::Text { text } => Some(text),
            LlmResponse::ToolCalls { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            LlmResponse::ToolCalls { calls } => calls,
            LlmResponse::Text { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn tool_calls_are_serialized_only_when_present() {
        let msg = Message::assistant_tool_calls(vec![ToolCall {
            id: "call_0".to_string(),
            name: "get_weather".to_string(),
            arguments: serde_json::json!({"city": "Lisbon"}),
        }]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["tool_calls"][0]["name"], "get_weather");

        let plain = serde_json::to_value(Message::user("hello")).unwrap();
        assert!(plain.get("tool_calls").is_none());
    }

    #[test]
    fn deserializes_turn_without_tool_calls() {
        let msg: Message = serde_json::from_str(r#"{"role":"user","content":"hey"}"#).unwrap();
        assert!(msg.is_user());
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn response_accessors() {
        let text = LlmResponse::Text {
            text: "Hello".to_string(),
        };
        assert_eq!(text.text(), Some("Hello"));
        assert!(text.tool_calls().is_empty());

        let calls = LlmResponse::ToolCalls { calls: vec![] };
        assert!(calls.text().is_none());
    }
}
