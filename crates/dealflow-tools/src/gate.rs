//! Gate - approval-gated tool dispatch
//!
//! Every model-emitted tool call becomes exactly one `ToolInvocation`. The
//! gate validates input, suspends side-effecting calls until an external
//! approval arrives, and guarantees at most one execution per approved
//! invocation. No retries happen in this layer; a retry is a new
//! model-issued call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::context::CallContext;
use crate::error::Error;
use crate::registry::ToolRegistry;

/// Lifecycle state of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    /// Waiting for an external approval decision
    PendingApproval,
    /// Executor is running
    Executing,
    /// Executor returned a result
    Succeeded,
    /// Executor failed, input was invalid, or the tool is unknown
    Failed,
}

/// External decision on a pending invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    /// Execute the invocation
    Granted,
    /// Reject the invocation; the model sees a failed result
    Denied,
}

/// One model-emitted tool call and its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Invocation id, the key approvals are addressed to
    pub id: Uuid,
    /// Provider-level call id, echoed back in the tool result message
    pub call_id: String,
    /// Tool name as emitted by the model
    pub tool_name: String,
    /// Parsed input arguments
    pub input: Value,
    /// Current state
    pub state: InvocationState,
    /// Executor output when succeeded
    pub output: Option<Value>,
    /// Error message when failed
    pub error: Option<String>,
    /// Execution duration in milliseconds (zero unless executed)
    pub duration_ms: u64,
}

impl ToolInvocation {
    fn pending(call_id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            input,
            state: InvocationState::PendingApproval,
            output: None,
            error: None,
            duration_ms: 0,
        }
    }

    fn failed(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Value,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            input,
            state: InvocationState::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms: 0,
        }
    }

    /// Whether the invocation reached a terminal success/failure state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            InvocationState::Succeeded | InvocationState::Failed
        )
    }

    /// Whether the invocation awaits an approval decision
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == InvocationState::PendingApproval
    }

    /// Uniform payload fed back to the model as the tool result
    #[must_use]
    pub fn result_payload(&self) -> Value {
        match self.state {
            InvocationState::Succeeded => json!({
                "success": true,
                "data": self.output.clone().unwrap_or(Value::Null),
            }),
            _ => json!({
                "success": false,
                "error": self
                    .error
                    .clone()
                    .unwrap_or_else(|| "not executed".to_string()),
            }),
        }
    }
}

/// Gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Per-invocation execution timeout
    pub tool_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// Approval-gated dispatcher over a registry
pub struct ApprovalGate {
    registry: Arc<ToolRegistry>,
    config: GateConfig,
}

impl ApprovalGate {
    /// Create a gate over a registry
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: GateConfig) -> Self {
        Self { registry, config }
    }

    /// Create with the default configuration
    #[must_use]
    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, GateConfig::default())
    }

    /// Dispatch one model-emitted call
    ///
    /// Unknown tools and schema violations become failed invocations the
    /// model can read; they are never raised to the caller. A call on a
    /// tool requiring approval comes back in `PendingApproval` without the
    /// executor having run.
    #[instrument(skip(self, call, ctx), fields(tool = %call.name, tenant = %ctx.tenant_id()))]
    pub async fn dispatch(
        &self,
        call: &dealflow_llm::ToolCall,
        ctx: &CallContext,
    ) -> ToolInvocation {
        let input = call.arguments_json();

        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model called an unregistered tool");
            return ToolInvocation::failed(
                &call.id,
                &call.name,
                input,
                format!("unknown tool: {}", call.name),
            );
        };

        let descriptor = tool.descriptor();
        let violations = descriptor.schema.validate(&input);
        if !violations.is_empty() {
            debug!(tool = %call.name, violations = violations.len(), "Input failed validation");
            let error = Error::InvalidInput {
                tool: call.name.clone(),
                violations,
            };
            return ToolInvocation::failed(&call.id, &call.name, input, error.to_string());
        }

        if descriptor.requires_approval {
            debug!(tool = %call.name, "Suspending side-effecting call for approval");
            return ToolInvocation::pending(&call.id, &call.name, input);
        }

        self.run(ToolInvocation::pending(&call.id, &call.name, input), ctx)
            .await
    }

    /// Execute a pending invocation after an explicit grant
    ///
    /// The caller holds the only copy of the pending invocation, so this
    /// runs the executor exactly once per grant.
    #[instrument(skip(self, invocation, ctx), fields(tool = %invocation.tool_name, id = %invocation.id))]
    pub async fn execute_approved(
        &self,
        invocation: ToolInvocation,
        ctx: &CallContext,
    ) -> ToolInvocation {
        if !invocation.is_pending() {
            return invocation;
        }
        self.run(invocation, ctx).await
    }

    /// Mark a pending invocation as denied
    ///
    /// The model sees a failed result and can adapt; nothing executes.
    #[must_use]
    pub fn deny(&self, mut invocation: ToolInvocation) -> ToolInvocation {
        invocation.state = InvocationState::Failed;
        invocation.error = Some("approval denied by user".to_string());
        invocation
    }

    async fn run(&self, mut invocation: ToolInvocation, ctx: &CallContext) -> ToolInvocation {
        let Some(tool) = self.registry.get(&invocation.tool_name) else {
            invocation.state = InvocationState::Failed;
            invocation.error = Some(format!("unknown tool: {}", invocation.tool_name));
            return invocation;
        };

        invocation.state = InvocationState::Executing;
        let start = Instant::now();
        debug!(
            tool = %invocation.tool_name,
            timeout_ms = %self.config.tool_timeout.as_millis(),
            "Executing tool"
        );

        match timeout(self.config.tool_timeout, tool.execute(&invocation.input, ctx)).await {
            Ok(Ok(output)) => {
                invocation.duration_ms = start.elapsed().as_millis() as u64;
                invocation.state = InvocationState::Succeeded;
                invocation.output = Some(output);
            }
            Ok(Err(e)) => {
                invocation.duration_ms = start.elapsed().as_millis() as u64;
                warn!(tool = %invocation.tool_name, error = %e, "Tool execution failed");
                invocation.state = InvocationState::Failed;
                invocation.error = Some(e.to_string());
            }
            Err(_) => {
                invocation.duration_ms = start.elapsed().as_millis() as u64;
                warn!(
                    tool = %invocation.tool_name,
                    timeout_ms = %self.config.tool_timeout.as_millis(),
                    "Tool execution timed out"
                );
                invocation.state = InvocationState::Failed;
                invocation.error = Some(format!(
                    "timed out after {}ms",
                    self.config.tool_timeout.as_millis()
                ));
            }
        }

        invocation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::registry::{Tool, ToolDescriptor};
    use crate::schema::{FieldType, InputSchema};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        descriptor: ToolDescriptor,
        executions: AtomicUsize,
        fail: bool,
    }

    impl CountingTool {
        fn new(descriptor: ToolDescriptor) -> Arc<Self> {
            Arc::new(Self {
                descriptor,
                executions: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(descriptor: ToolDescriptor) -> Arc<Self> {
            Arc::new(Self {
                descriptor,
                executions: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn executions(&self) -> usize {
            self.executions.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Tool for CountingTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn execute(
            &self,
            input: &Value,
            _ctx: &CallContext,
        ) -> std::result::Result<Value, ToolError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ToolError::Backend("store unavailable".to_string()));
            }
            Ok(json!({ "echo": input }))
        }
    }

    fn call(name: &str, arguments: &str) -> dealflow_llm::ToolCall {
        dealflow_llm::ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn ctx() -> CallContext {
        CallContext::new("tenant-1")
    }

    fn gate_with(tool: Arc<CountingTool>) -> ApprovalGate {
        let mut registry = ToolRegistry::new();
        registry.register(tool).unwrap();
        ApprovalGate::with_defaults(Arc::new(registry))
    }

    #[tokio::test]
    async fn unknown_tool_becomes_failed_invocation() {
        let gate = ApprovalGate::with_defaults(Arc::new(ToolRegistry::new()));
        let invocation = gate.dispatch(&call("missing", "{}"), &ctx()).await;
        assert_eq!(invocation.state, InvocationState::Failed);
        assert!(invocation.error.as_deref().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn invalid_input_becomes_failed_invocation_with_field() {
        let tool = CountingTool::new(
            ToolDescriptor::new("move_deal", "Move a deal").with_schema(
                InputSchema::new()
                    .required("deal_id", FieldType::String, "Deal id")
                    .required("stage", FieldType::String, "Stage"),
            ),
        );
        let gate = gate_with(tool.clone());

        let invocation = gate
            .dispatch(&call("move_deal", r#"{"deal_id": "d-1"}"#), &ctx())
            .await;
        assert_eq!(invocation.state, InvocationState::Failed);
        assert!(invocation.error.as_deref().unwrap().contains("stage"));
        // validation failures never reach the executor
        assert_eq!(tool.executions(), 0);
    }

    #[tokio::test]
    async fn approval_required_suspends_without_executing() {
        let tool = CountingTool::new(ToolDescriptor::new("delete_deal", "Delete").with_approval());
        let gate = gate_with(tool.clone());

        let invocation = gate.dispatch(&call("delete_deal", "{}"), &ctx()).await;
        assert_eq!(invocation.state, InvocationState::PendingApproval);
        assert_eq!(tool.executions(), 0);
    }

    #[tokio::test]
    async fn grant_executes_exactly_once() {
        let tool = CountingTool::new(ToolDescriptor::new("delete_deal", "Delete").with_approval());
        let gate = gate_with(tool.clone());

        let pending = gate.dispatch(&call("delete_deal", "{}"), &ctx()).await;
        let done = gate.execute_approved(pending, &ctx()).await;
        assert_eq!(done.state, InvocationState::Succeeded);
        assert_eq!(tool.executions(), 1);

        // a terminal invocation passed back in is returned untouched
        let again = gate.execute_approved(done, &ctx()).await;
        assert_eq!(again.state, InvocationState::Succeeded);
        assert_eq!(tool.executions(), 1);
    }

    #[tokio::test]
    async fn denial_fails_without_executing() {
        let tool = CountingTool::new(ToolDescriptor::new("delete_deal", "Delete").with_approval());
        let gate = gate_with(tool.clone());

        let pending = gate.dispatch(&call("delete_deal", "{}"), &ctx()).await;
        let denied = gate.deny(pending);
        assert_eq!(denied.state, InvocationState::Failed);
        assert!(denied.error.as_deref().unwrap().contains("denied"));
        assert_eq!(tool.executions(), 0);
        assert_eq!(denied.result_payload()["success"], false);
    }

    #[tokio::test]
    async fn executor_error_becomes_structured_failure() {
        let tool = CountingTool::failing(ToolDescriptor::new("list_deals", "List"));
        let gate = gate_with(tool);

        let invocation = gate.dispatch(&call("list_deals", "{}"), &ctx()).await;
        assert_eq!(invocation.state, InvocationState::Failed);
        let payload = invocation.result_payload();
        assert_eq!(payload["success"], false);
        assert!(payload["error"].as_str().unwrap().contains("store unavailable"));
    }

    struct SlowTool {
        descriptor: ToolDescriptor,
    }

    #[async_trait::async_trait]
    impl Tool for SlowTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn execute(
            &self,
            _input: &Value,
            _ctx: &CallContext,
        ) -> std::result::Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn slow_executor_times_out_into_failed_invocation() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(SlowTool {
                descriptor: ToolDescriptor::new("slow_report", "Crunches forever"),
            }))
            .unwrap();
        let gate = ApprovalGate::new(
            Arc::new(registry),
            GateConfig {
                tool_timeout: Duration::from_millis(20),
            },
        );

        let invocation = gate.dispatch(&call("slow_report", "{}"), &ctx()).await;
        assert_eq!(invocation.state, InvocationState::Failed);
        assert!(invocation.error.as_deref().unwrap().contains("timed out"));
        let payload = invocation.result_payload();
        assert_eq!(payload["success"], false);
    }

    #[tokio::test]
    async fn garbage_arguments_fall_back_to_empty_object() {
        let tool = CountingTool::new(ToolDescriptor::new("pipeline_summary", "Summarize"));
        let gate = gate_with(tool);

        let invocation = gate
            .dispatch(&call("pipeline_summary", "not json"), &ctx())
            .await;
        assert_eq!(invocation.state, InvocationState::Succeeded);
    }
}
