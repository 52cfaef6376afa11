//! Sanitize - normalize heterogeneous caller history for the model
//!
//! Chat UIs hand the runtime whatever they stored: messages with missing
//! roles, multi-part content, embedded tool-invocation records. Sanitization
//! compresses all of it into an ordered list of plain text messages. The
//! function is pure; the same input always yields the same output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dealflow_llm::Message;
use dealflow_tools::{InvocationState, ToolInvocation};

/// One content part of a multi-part message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPart {
    /// Part type; only "text" parts survive sanitization
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for text parts
    #[serde(default)]
    pub text: Option<String>,
}

/// Message content as stored by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    /// Plain text
    Text(String),
    /// Mixed text/attachment parts
    Parts(Vec<RawPart>),
}

impl Default for RawContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// A conversation message as handed over by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Role, possibly absent or unrecognized
    #[serde(default)]
    pub role: Option<String>,
    /// Content, plain or multi-part
    #[serde(default)]
    pub content: RawContent,
    /// Tool-invocation records attached to this message in prior runs
    #[serde(default)]
    pub invocations: Vec<ToolInvocation>,
}

impl RawMessage {
    /// A user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            content: RawContent::Text(text.into()),
            invocations: Vec::new(),
        }
    }

    /// An assistant message
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Some("assistant".to_string()),
            content: RawContent::Text(text.into()),
            invocations: Vec::new(),
        }
    }

    /// A system message
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Some("system".to_string()),
            content: RawContent::Text(text.into()),
            invocations: Vec::new(),
        }
    }

    /// Attach tool-invocation records
    #[must_use]
    pub fn with_invocations(mut self, invocations: Vec<ToolInvocation>) -> Self {
        self.invocations = invocations;
        self
    }
}

/// Normalize caller history into model-consumable messages
///
/// Messages without a recognizable role are dropped. Multi-part content is
/// flattened to its text segments. Terminal tool invocations collapse to one
/// line each; in-flight ones are skipped. Empty results are dropped, so the
/// output is never longer than the input.
#[must_use]
pub fn sanitize(history: &[RawMessage]) -> Vec<Message> {
    history
        .iter()
        .filter_map(|raw| {
            let role = raw.role.as_deref()?;
            let mut text = flatten(&raw.content);

            for invocation in &raw.invocations {
                if let Some(line) = summarize_invocation(invocation) {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&line);
                }
            }

            if text.is_empty() {
                return None;
            }

            match role {
                "user" => Some(Message::user(text)),
                "assistant" => Some(Message::assistant(text)),
                "system" => Some(Message::system(text)),
                _ => None,
            }
        })
        .collect()
}

fn flatten(content: &RawContent) -> String {
    match content {
        RawContent::Text(text) => text.trim().to_string(),
        RawContent::Parts(parts) => parts
            .iter()
            .filter(|p| p.kind == "text")
            .filter_map(|p| p.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn summarize_invocation(invocation: &ToolInvocation) -> Option<String> {
    match invocation.state {
        InvocationState::Succeeded => Some(summarize_success(invocation)),
        InvocationState::Failed => Some(format!(
            "[tool {} failed: {}]",
            invocation.tool_name,
            invocation.error.as_deref().unwrap_or("unknown error")
        )),
        InvocationState::PendingApproval | InvocationState::Executing => None,
    }
}

fn summarize_success(invocation: &ToolInvocation) -> String {
    let name = &invocation.tool_name;
    let Some(output) = &invocation.output else {
        return format!("[tool {name} completed]");
    };
    if let Some(count) = output.get("count").and_then(Value::as_u64) {
        return format!("[tool {name} returned {count} results]");
    }
    if let Some(label) = output
        .get("title")
        .or_else(|| output.get("name"))
        .and_then(Value::as_str)
    {
        return format!("[tool {name} returned \"{label}\"]");
    }
    format!("[tool {name} completed]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealflow_llm::MessageRole;
    use serde_json::json;
    use uuid::Uuid;

    fn invocation(state: InvocationState, output: Option<Value>, error: Option<&str>) -> ToolInvocation {
        ToolInvocation {
            id: Uuid::new_v4(),
            call_id: "call_1".to_string(),
            tool_name: "list_deals".to_string(),
            input: json!({}),
            state,
            output,
            error: error.map(String::from),
            duration_ms: 3,
        }
    }

    #[test]
    fn drops_missing_and_unknown_roles() {
        let history = vec![
            RawMessage {
                role: None,
                content: RawContent::Text("orphan".to_string()),
                invocations: vec![],
            },
            RawMessage {
                role: Some("robot".to_string()),
                content: RawContent::Text("who am i".to_string()),
                invocations: vec![],
            },
            RawMessage::user("hello"),
        ];

        let out = sanitize(&history);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, MessageRole::User);
        assert_eq!(out[0].content, "hello");
    }

    #[test]
    fn flattens_multipart_content() {
        let history = vec![RawMessage {
            role: Some("user".to_string()),
            content: RawContent::Parts(vec![
                RawPart {
                    kind: "text".to_string(),
                    text: Some("  first  ".to_string()),
                },
                RawPart {
                    kind: "attachment".to_string(),
                    text: None,
                },
                RawPart {
                    kind: "text".to_string(),
                    text: Some("second".to_string()),
                },
            ]),
            invocations: vec![],
        }];

        let out = sanitize(&history);
        assert_eq!(out[0].content, "first\nsecond");
    }

    #[test]
    fn collapses_terminal_invocations_to_one_line_each() {
        let history = vec![RawMessage::assistant("Here is what I found").with_invocations(vec![
            invocation(
                InvocationState::Succeeded,
                Some(json!({ "deals": [], "count": 2 })),
                None,
            ),
            invocation(InvocationState::Failed, None, Some("not found: deal d-9")),
            invocation(InvocationState::PendingApproval, None, None),
        ])];

        let out = sanitize(&history);
        assert_eq!(out.len(), 1);
        let text = &out[0].content;
        assert!(text.contains("[tool list_deals returned 2 results]"));
        assert!(text.contains("[tool list_deals failed: not found: deal d-9]"));
        // the pending record leaves no trace
        assert_eq!(text.matches("[tool").count(), 2);
    }

    #[test]
    fn uses_result_label_when_present() {
        let history = vec![RawMessage::assistant("").with_invocations(vec![invocation(
            InvocationState::Succeeded,
            Some(json!({ "id": "d-1", "title": "Acme rollout" })),
            None,
        )])];

        let out = sanitize(&history);
        assert_eq!(out[0].content, "[tool list_deals returned \"Acme rollout\"]");
    }

    #[test]
    fn empty_messages_are_dropped_and_length_never_grows() {
        let history = vec![
            RawMessage::user("   "),
            RawMessage::assistant(""),
            RawMessage::user("real question"),
        ];

        let out = sanitize(&history);
        assert_eq!(out.len(), 1);
        assert!(out.len() <= history.len());
    }

    #[test]
    fn sanitize_is_deterministic() {
        let history = vec![
            RawMessage::user("q"),
            RawMessage::assistant("a").with_invocations(vec![invocation(
                InvocationState::Succeeded,
                Some(json!({ "count": 1 })),
                None,
            )]),
        ];

        let a = sanitize(&history);
        let b = sanitize(&history);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.content, y.content);
        }
    }
}
