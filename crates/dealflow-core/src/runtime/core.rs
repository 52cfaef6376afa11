//! Core - the agent step loop
//!
//! One run is a strict sequence of steps. Each step composes instructions,
//! invokes the provider chain once, resolves the model's tool calls through
//! the approval gate in emitted order, and appends a step record. Gated
//! calls suspend the run; resumes finish the interrupted step without
//! re-executing anything that already ran.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use dealflow_llm::{
    ChatRequest, FallbackExecutor, Message, ModelProvider, ProviderAttempt, ToolCall,
};
use dealflow_tools::{
    ApprovalDecision, ApprovalGate, CallContext, GateConfig, ToolInvocation, ToolRegistry,
};

use crate::composer::{compose_initial, compose_step_reminder};
use crate::error::{Error, Result};
use crate::quota::{QuotaDecision, QuotaGate};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::types::{AgentRequest, AgentRunResult, FinishReason, PausedRun, StepRecord};
use crate::sanitize::sanitize;

/// The step-loop orchestrator
pub struct AgentRuntime {
    registry: Arc<ToolRegistry>,
    gate: ApprovalGate,
    executor: FallbackExecutor,
    quota: Option<Arc<dyn QuotaGate>>,
    config: RuntimeConfig,
    paused: DashMap<Uuid, PausedRun>,
    active: DashMap<Uuid, CancellationToken>,
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime").finish_non_exhaustive()
    }
}

enum Dispatched {
    Complete(Vec<ToolInvocation>),
    Suspended {
        completed: Vec<ToolInvocation>,
        pending: ToolInvocation,
        remaining: Vec<ToolCall>,
    },
}

impl AgentRuntime {
    /// Create a runtime over a registry and a priority-ordered provider list
    ///
    /// # Errors
    /// Fails when the provider list is empty.
    pub fn new(
        registry: Arc<ToolRegistry>,
        providers: Vec<Arc<dyn ModelProvider>>,
        config: RuntimeConfig,
    ) -> Result<Self> {
        let executor = FallbackExecutor::new(providers)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        let gate = ApprovalGate::new(
            registry.clone(),
            GateConfig {
                tool_timeout: config.tool_timeout,
            },
        );
        Ok(Self {
            registry,
            gate,
            executor,
            quota: None,
            config,
            paused: DashMap::new(),
            active: DashMap::new(),
        })
    }

    /// Attach a quota gate, consulted before every model invocation
    #[must_use]
    pub fn with_quota(mut self, quota: Arc<dyn QuotaGate>) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Request cancellation of an in-flight run
    ///
    /// Between steps the run terminates with `Cancelled`. If tool calls are
    /// already executing they finish first; the interrupted step's model
    /// text is discarded but its tool effects are kept.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        match self.active.get(&run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a run is suspended awaiting approval
    #[must_use]
    pub fn is_paused(&self, run_id: Uuid) -> bool {
        self.paused.contains_key(&run_id)
    }

    /// Execute (or resume) an agent run
    ///
    /// # Errors
    /// `TenantNotResolved` when the context has no tenant id and
    /// `RunNotFound` when a resume targets an unknown run. Everything else
    /// comes back inside a well-formed `AgentRunResult`.
    #[instrument(skip(self, request), fields(tenant = %request.context.tenant_id()))]
    pub async fn run(&self, request: AgentRequest) -> Result<AgentRunResult> {
        if !request.context.has_tenant() {
            return Err(Error::TenantNotResolved);
        }

        let run_id = request
            .resume_run_id
            .or(request.run_id)
            .unwrap_or_else(Uuid::new_v4);
        let token = CancellationToken::new();
        self.active.insert(run_id, token.clone());
        let result = self.run_inner(run_id, request, token).await;
        self.active.remove(&run_id);
        result
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        request: AgentRequest,
        token: CancellationToken,
    ) -> Result<AgentRunResult> {
        let start = Instant::now();

        let mut state = match request.resume_run_id {
            Some(resume_id) => match self.resume_state(run_id, resume_id, &request, start).await? {
                ResumeOutcome::Continue(state) => state,
                ResumeOutcome::Finished(result) => return Ok(result),
            },
            None => RunState {
                ctx: request.context,
                base: request
                    .base_instructions
                    .unwrap_or_else(|| self.config.base_instructions.clone()),
                convo: sanitize(&request.history),
                steps: Vec::new(),
                diagnostics: Vec::new(),
                model: None,
            },
        };

        loop {
            let step_number = state.steps.len() as u32 + 1;

            if token.is_cancelled() {
                info!(run_id = %run_id, "Run cancelled between steps");
                return Ok(state.finish(run_id, FinishReason::Cancelled, String::new(), None, start));
            }
            if step_number > self.config.max_steps {
                debug!(run_id = %run_id, max_steps = self.config.max_steps, "Step limit reached");
                return Ok(state.finish(
                    run_id,
                    FinishReason::StepLimitReached,
                    String::new(),
                    None,
                    start,
                ));
            }

            if let Some(quota) = &self.quota {
                if let QuotaDecision::Deny { reason } = quota.check(state.ctx.tenant_id()).await {
                    warn!(run_id = %run_id, reason = %reason, "Quota gate denied the run");
                    return Ok(state.finish(
                        run_id,
                        FinishReason::QuotaExceeded,
                        String::new(),
                        Some(reason),
                        start,
                    ));
                }
            }

            let chat_request = self.build_request(&state);
            debug!(run_id = %run_id, step = step_number, "Invoking model");

            let response = match timeout(
                self.config.step_timeout,
                self.executor.execute(&chat_request),
            )
            .await
            {
                Err(_) => {
                    warn!(run_id = %run_id, step = step_number, "Model invocation timed out");
                    return Ok(state.finish(
                        run_id,
                        FinishReason::FatalError,
                        String::new(),
                        Some(format!(
                            "model invocation timed out after {}ms",
                            self.config.step_timeout.as_millis()
                        )),
                        start,
                    ));
                }
                Ok(Err(e)) => {
                    warn!(run_id = %run_id, step = step_number, error = %e, "Model invocation failed");
                    return Ok(state.finish(
                        run_id,
                        FinishReason::FatalError,
                        String::new(),
                        Some(e.to_string()),
                        start,
                    ));
                }
                Ok(Ok((response, attempts))) => {
                    state.diagnostics.extend(attempts);
                    state.model = Some(response.model.clone());
                    response
                }
            };

            if !response.has_tool_calls() {
                let text = response.text().trim().to_string();
                let reason = if text.is_empty() {
                    FinishReason::ModelDeclinedFurtherTools
                } else {
                    FinishReason::StopConditionReached
                };
                state.steps.push(StepRecord {
                    step_number,
                    model_text: text.clone(),
                    invocations: Vec::new(),
                });
                info!(run_id = %run_id, steps = state.steps.len(), reason = %reason, "Run finished");
                return Ok(state.finish(run_id, reason, text, None, start));
            }

            let step_text = response.text().trim().to_string();
            state.convo.push(Message::assistant_with_tool_calls(
                step_text.clone(),
                response.tool_calls.clone(),
            ));

            match self
                .dispatch_calls(&response.tool_calls, &state.ctx, Vec::new())
                .await
            {
                Dispatched::Suspended {
                    completed,
                    pending,
                    remaining,
                } => {
                    return Ok(self.suspend(run_id, state, step_number, step_text, completed, pending, remaining, start));
                }
                Dispatched::Complete(invocations) => {
                    push_tool_results(&mut state.convo, &invocations);
                    // cancellation observed mid-step keeps the tool effects
                    // but drops the step's model text
                    let cancelled = token.is_cancelled();
                    state.steps.push(StepRecord {
                        step_number,
                        model_text: if cancelled { String::new() } else { step_text },
                        invocations,
                    });
                    if cancelled {
                        info!(run_id = %run_id, step = step_number, "Run cancelled after tool execution");
                        return Ok(state.finish(
                            run_id,
                            FinishReason::Cancelled,
                            String::new(),
                            None,
                            start,
                        ));
                    }
                }
            }
        }
    }

    async fn resume_state(
        &self,
        run_id: Uuid,
        resume_id: Uuid,
        request: &AgentRequest,
        start: Instant,
    ) -> Result<ResumeOutcome> {
        let Some((_, paused)) = self.paused.remove(&resume_id) else {
            return Err(Error::RunNotFound(resume_id));
        };
        // runs are only resumable by the tenant that started them
        if paused.context.tenant_id() != request.context.tenant_id() {
            self.paused.insert(resume_id, paused);
            return Err(Error::RunNotFound(resume_id));
        }

        let Some(decision) = request.approvals.get(&paused.pending.id).copied() else {
            debug!(run_id = %run_id, pending = %paused.pending.id, "Resume carried no decision, staying paused");
            let result = pending_result(&paused, start);
            self.paused.insert(resume_id, paused);
            return Ok(ResumeOutcome::Finished(result));
        };

        let resolved = match decision {
            ApprovalDecision::Granted => {
                info!(run_id = %run_id, tool = %paused.pending.tool_name, "Approval granted, executing gated call");
                self.gate
                    .execute_approved(paused.pending.clone(), &paused.context)
                    .await
            }
            ApprovalDecision::Denied => {
                info!(run_id = %run_id, tool = %paused.pending.tool_name, "Approval denied");
                self.gate.deny(paused.pending.clone())
            }
        };

        let mut state = RunState {
            ctx: paused.context.clone(),
            base: paused.base_instructions.clone(),
            convo: paused.convo.clone(),
            steps: paused.steps.clone(),
            diagnostics: paused.diagnostics.clone(),
            model: paused.model.clone(),
        };
        let mut invocations = paused.completed.clone();
        invocations.push(resolved);

        match self
            .dispatch_calls(&paused.remaining, &state.ctx, invocations)
            .await
        {
            Dispatched::Suspended {
                completed,
                pending,
                remaining,
            } => Ok(ResumeOutcome::Finished(self.suspend(
                run_id,
                state,
                paused.step_number,
                paused.step_text,
                completed,
                pending,
                remaining,
                start,
            ))),
            Dispatched::Complete(invocations) => {
                push_tool_results(&mut state.convo, &invocations);
                state.steps.push(StepRecord {
                    step_number: paused.step_number,
                    model_text: paused.step_text,
                    invocations,
                });
                Ok(ResumeOutcome::Continue(state))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn suspend(
        &self,
        run_id: Uuid,
        state: RunState,
        step_number: u32,
        step_text: String,
        completed: Vec<ToolInvocation>,
        pending: ToolInvocation,
        remaining: Vec<ToolCall>,
        start: Instant,
    ) -> AgentRunResult {
        info!(
            run_id = %run_id,
            tool = %pending.tool_name,
            invocation = %pending.id,
            "Suspending run for approval"
        );
        let paused = PausedRun {
            run_id,
            context: state.ctx,
            convo: state.convo,
            steps: state.steps,
            step_number,
            step_text,
            completed,
            pending,
            remaining,
            base_instructions: state.base,
            diagnostics: state.diagnostics,
            model: state.model,
            paused_at: Utc::now(),
        };
        let result = pending_result(&paused, start);
        self.paused.insert(run_id, paused);
        result
    }

    fn build_request(&self, state: &RunState) -> ChatRequest {
        let mut instructions = compose_initial(&state.base, &state.ctx);
        if let Some(reminder) = compose_step_reminder(&state.steps, &self.registry) {
            instructions.push_str("\n\n");
            instructions.push_str(&reminder);
        }

        let mut messages = Vec::with_capacity(state.convo.len() + 1);
        messages.push(Message::system(instructions));
        messages.extend(state.convo.iter().cloned());

        ChatRequest {
            model: self.config.model.clone().unwrap_or_default(),
            messages,
            tools: self.registry.to_model_tools(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    async fn dispatch_calls(
        &self,
        calls: &[ToolCall],
        ctx: &CallContext,
        mut resolved: Vec<ToolInvocation>,
    ) -> Dispatched {
        for (index, call) in calls.iter().enumerate() {
            let invocation = self.gate.dispatch(call, ctx).await;
            if invocation.is_pending() {
                return Dispatched::Suspended {
                    completed: resolved,
                    pending: invocation,
                    remaining: calls[index + 1..].to_vec(),
                };
            }
            resolved.push(invocation);
        }
        Dispatched::Complete(resolved)
    }
}

enum ResumeOutcome {
    Continue(RunState),
    Finished(AgentRunResult),
}

struct RunState {
    ctx: CallContext,
    base: String,
    convo: Vec<Message>,
    steps: Vec<StepRecord>,
    diagnostics: Vec<ProviderAttempt>,
    model: Option<String>,
}

impl RunState {
    fn finish(
        self,
        run_id: Uuid,
        finish_reason: FinishReason,
        response: String,
        error: Option<String>,
        start: Instant,
    ) -> AgentRunResult {
        AgentRunResult {
            run_id,
            finish_reason,
            response,
            steps: self.steps,
            pending_invocations: Vec::new(),
            model: self.model,
            error,
            duration_ms: start.elapsed().as_millis() as u64,
            diagnostics: self.diagnostics,
        }
    }
}

fn pending_result(paused: &PausedRun, start: Instant) -> AgentRunResult {
    AgentRunResult {
        run_id: paused.run_id,
        finish_reason: FinishReason::PendingApproval,
        response: String::new(),
        steps: paused.steps.clone(),
        pending_invocations: vec![paused.pending.id],
        model: paused.model.clone(),
        error: None,
        duration_ms: start.elapsed().as_millis() as u64,
        diagnostics: paused.diagnostics.clone(),
    }
}

fn push_tool_results(convo: &mut Vec<Message>, invocations: &[ToolInvocation]) {
    for invocation in invocations {
        convo.push(Message::tool_response(
            invocation.call_id.clone(),
            invocation.tool_name.clone(),
            invocation.result_payload().to_string(),
        ));
    }
}
