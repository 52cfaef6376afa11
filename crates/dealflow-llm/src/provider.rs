//! Model provider trait definition

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::Result;

/// Trait for model providers
///
/// A provider is an interchangeable backend capable of producing a model
/// response from messages, instructions and tool schemas. Construction
/// (API keys, model ids) happens in the caller's configuration layer.
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Check if the provider supports function calling/tools
    fn supports_tools(&self) -> bool;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Complete a conversation, optionally emitting tool calls
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}
