//! Dealflow LLM - Model Provider Abstraction
//!
//! This crate provides the model layer for the Dealflow agent runtime:
//! - Provider: the `ModelProvider` trait every backend implements
//! - Fallback: ordered multi-provider execution with per-attempt diagnostics
//! - OpenAI: a provider speaking the OpenAI-compatible chat-completions format
//! - Mock: a scripted provider for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod fallback;
pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod tools;

pub use chat::{ChatRequest, ChatResponse};
pub use error::{Error, Result};
pub use fallback::{AttemptOutcome, FallbackExecutor, ProviderAttempt};
pub use message::{Message, MessageRole};
pub use mock::MockProvider;
pub use openai::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use provider::ModelProvider;
pub use tools::{ToolCall, ToolDefinition};
