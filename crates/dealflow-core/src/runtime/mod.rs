//! Runtime - the step-loop orchestrator and its types

mod config;
mod core;
mod types;

pub use self::config::{RuntimeConfig, DEFAULT_INSTRUCTIONS};
pub use self::core::AgentRuntime;
pub use self::types::{AgentRequest, AgentRunResult, FinishReason, PausedRun, StepRecord};
