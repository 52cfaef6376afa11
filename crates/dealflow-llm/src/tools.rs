//! Tool types for model function calling

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tool definition exported to the model (schema only, no executor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments as a JSON string
    pub arguments: String,
}

impl ToolCall {
    /// Parse arguments as a typed value
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.arguments).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Parse arguments as a JSON value, treating empty strings as an empty object
    #[must_use]
    pub fn arguments_json(&self) -> serde_json::Value {
        if self.arguments.trim().is_empty() {
            return serde_json::json!({});
        }
        serde_json::from_str(&self.arguments).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definition() {
        let tool = ToolDefinition::new(
            "move_deal",
            "Move a deal to another stage",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "deal_id": {"type": "string"},
                    "stage": {"type": "string"}
                },
                "required": ["deal_id", "stage"]
            }),
        );

        assert_eq!(tool.name, "move_deal");
        assert!(tool.parameters["required"].is_array());
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "move_deal".to_string(),
            arguments: r#"{"deal_id": "d-42", "stage": "Proposta"}"#.to_string(),
        };

        #[derive(Deserialize)]
        struct Args {
            deal_id: String,
            stage: String,
        }

        let args: Args = call.parse_arguments().unwrap();
        assert_eq!(args.deal_id, "d-42");
        assert_eq!(args.stage, "Proposta");
    }

    #[test]
    fn test_arguments_json_tolerates_garbage() {
        let call = ToolCall {
            id: "call_2".to_string(),
            name: "list_deals".to_string(),
            arguments: "not json".to_string(),
        };
        assert_eq!(call.arguments_json(), serde_json::json!({}));

        let empty = ToolCall {
            id: "call_3".to_string(),
            name: "list_deals".to_string(),
            arguments: "  ".to_string(),
        };
        assert_eq!(empty.arguments_json(), serde_json::json!({}));
    }
}
