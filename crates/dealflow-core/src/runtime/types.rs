//! Runtime types - requests, step records and run results

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dealflow_llm::{Message, ProviderAttempt, ToolCall};
use dealflow_tools::{ApprovalDecision, CallContext, ToolInvocation};

use crate::sanitize::RawMessage;

/// Why a run terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model produced a final textual answer
    StopConditionReached,
    /// The model stopped without text and without further tool calls
    ModelDeclinedFurtherTools,
    /// The configured step bound was hit
    StepLimitReached,
    /// A side-effecting call awaits an external approval decision
    PendingApproval,
    /// The quota gate denied the run before any provider call
    QuotaExceeded,
    /// The caller cancelled the run
    Cancelled,
    /// Provider exhaustion or step timeout ended the run
    FatalError,
}

impl FinishReason {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopConditionReached => "stop_condition_reached",
            Self::ModelDeclinedFurtherTools => "model_declined_further_tools",
            Self::StepLimitReached => "step_limit_reached",
            Self::PendingApproval => "pending_approval",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Cancelled => "cancelled",
            Self::FatalError => "fatal_error",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completed round of model invocation and tool resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based step number, strictly increasing within a run
    pub step_number: u32,
    /// Text the model produced in this step
    pub model_text: String,
    /// Tool invocations resolved in this step, in emitted order
    pub invocations: Vec<ToolInvocation>,
}

/// Terminal output of a run (or of a suspension point)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    /// Run identifier; resumes are addressed to it
    pub run_id: Uuid,
    /// Why the run stopped
    pub finish_reason: FinishReason,
    /// Final assistant text (empty unless a natural stop occurred)
    pub response: String,
    /// Full step history accumulated so far
    pub steps: Vec<StepRecord>,
    /// Ids of invocations awaiting approval, when suspended
    pub pending_invocations: Vec<Uuid>,
    /// Model that served the last completed invocation
    pub model: Option<String>,
    /// Fatal diagnostic message, set only for `FatalError` and `QuotaExceeded`
    pub error: Option<String>,
    /// Wall-clock duration of this call in milliseconds
    pub duration_ms: u64,
    /// Per-provider attempt trail across all steps
    pub diagnostics: Vec<ProviderAttempt>,
}

/// An agent invocation (fresh or resuming)
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Conversation history as stored by the caller
    pub history: Vec<RawMessage>,
    /// Tenant-scoped call context
    pub context: CallContext,
    /// Persona text overriding the runtime default
    pub base_instructions: Option<String>,
    /// Approval decisions keyed by pending invocation id
    pub approvals: HashMap<Uuid, ApprovalDecision>,
    /// Paused run to resume instead of starting fresh
    pub resume_run_id: Option<Uuid>,
    /// Pre-assigned run id, letting the caller cancel from another task
    pub run_id: Option<Uuid>,
}

impl AgentRequest {
    /// Create a fresh run request
    #[must_use]
    pub fn new(history: Vec<RawMessage>, context: CallContext) -> Self {
        Self {
            history,
            context,
            base_instructions: None,
            approvals: HashMap::new(),
            resume_run_id: None,
            run_id: None,
        }
    }

    /// Override the persona text
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.base_instructions = Some(instructions.into());
        self
    }

    /// Attach an approval decision
    #[must_use]
    pub fn with_approval(mut self, invocation_id: Uuid, decision: ApprovalDecision) -> Self {
        self.approvals.insert(invocation_id, decision);
        self
    }

    /// Resume a paused run
    #[must_use]
    pub fn resuming(mut self, run_id: Uuid) -> Self {
        self.resume_run_id = Some(run_id);
        self
    }

    /// Pre-assign the run id
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// Serialized state of a run suspended at the approval gate
///
/// Holds everything needed to finish the interrupted step without
/// re-executing anything that already ran.
#[derive(Debug, Clone)]
pub struct PausedRun {
    /// Run id the pause is keyed by
    pub run_id: Uuid,
    /// Context the run started with; resumes reuse it
    pub context: CallContext,
    /// Working conversation as of suspension, system message excluded
    pub convo: Vec<Message>,
    /// Steps completed before the interrupted one
    pub steps: Vec<StepRecord>,
    /// Number of the interrupted step
    pub step_number: u32,
    /// Model text of the interrupted step
    pub step_text: String,
    /// Invocations of the interrupted step resolved before suspension
    pub completed: Vec<ToolInvocation>,
    /// The gated invocation awaiting a decision
    pub pending: ToolInvocation,
    /// Calls after the gated one, not yet dispatched
    pub remaining: Vec<ToolCall>,
    /// Persona text in effect for the run
    pub base_instructions: String,
    /// Diagnostics accumulated before suspension
    pub diagnostics: Vec<ProviderAttempt>,
    /// Model that served the interrupted step
    pub model: Option<String>,
    /// When the run was suspended
    pub paused_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_serializes_snake_case() {
        let json = serde_json::to_string(&FinishReason::StepLimitReached).unwrap();
        assert_eq!(json, "\"step_limit_reached\"");
        assert_eq!(FinishReason::PendingApproval.as_str(), "pending_approval");
    }

    #[test]
    fn request_builder_collects_approvals() {
        let id = Uuid::new_v4();
        let request = AgentRequest::new(vec![], CallContext::new("t"))
            .with_approval(id, ApprovalDecision::Granted)
            .resuming(id);
        assert_eq!(request.approvals.len(), 1);
        assert_eq!(request.resume_run_id, Some(id));
    }
}
