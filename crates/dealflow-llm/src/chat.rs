//! Chat request and response types

use crate::message::Message;
use crate::tools::{ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};

/// A chat completion request, optionally carrying tool schemas
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model to use (provider-specific; empty means provider default)
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Tools the model may call (schemas only)
    pub tools: Vec<ToolDefinition>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Create a new request for a model
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add messages
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Set the tool list
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A chat completion response that may include tool calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text content (if any)
    pub content: Option<String>,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// Finish reason reported by the provider
    pub finish_reason: Option<String>,
    /// Model used
    pub model: String,
}

impl ChatResponse {
    /// Check if the response has tool calls
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content, empty string when absent
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_builder() {
        let request = ChatRequest::new("gpt-4o-mini")
            .with_message(Message::system("You are helpful"))
            .with_message(Message::user("Hello"))
            .with_max_tokens(256)
            .with_temperature(0.2);

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.max_tokens, Some(256));
    }

    #[test]
    fn test_chat_response_has_tool_calls() {
        let response = ChatResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "list_deals".to_string(),
                arguments: "{}".to_string(),
            }],
            finish_reason: Some("tool_calls".to_string()),
            model: "m".to_string(),
        };
        assert!(response.has_tool_calls());
        assert_eq!(response.text(), "");

        let plain = ChatResponse {
            content: Some("done".to_string()),
            tool_calls: vec![],
            finish_reason: Some("stop".to_string()),
            model: "m".to_string(),
        };
        assert!(!plain.has_tool_calls());
        assert_eq!(plain.text(), "done");
    }
}
