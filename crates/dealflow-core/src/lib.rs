//! Dealflow Core - Agent Step-Loop Orchestrator
//!
//! This crate is the control plane of the Dealflow agent runtime:
//! - Sanitize: normalizes heterogeneous caller history for the model
//! - Composer: layered system instructions plus cross-step memory reminders
//! - Quota: governance hook consulted before every model invocation
//! - Runtime: the step loop with approval suspension, provider fallback,
//!   cancellation and a bounded step count
//!
//! Tool implementations live in `dealflow-tools`; provider plumbing lives in
//! `dealflow-llm`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod composer;
pub mod error;
pub mod quota;
pub mod runtime;
pub mod sanitize;

pub use composer::{compose_initial, compose_step_reminder, KnownEntities, KnownEntity};
pub use error::{Error, Result};
pub use quota::{QuotaDecision, QuotaGate, UnlimitedQuota};
pub use runtime::{
    AgentRequest, AgentRunResult, AgentRuntime, FinishReason, RuntimeConfig, StepRecord,
    DEFAULT_INSTRUCTIONS,
};
pub use sanitize::{sanitize, RawContent, RawMessage, RawPart};
