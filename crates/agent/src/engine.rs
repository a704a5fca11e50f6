//! The Agent Engine (spec §4.3): drives one [`AgentState`] forward step by
//! step until it reaches a terminal status. Grounded on
//! `aigent_runtime::tool_loop::run_tool_loop`'s round structure (build
//! tools for this round, call the provider, execute any tool calls it
//! asked for, append results in call order) and
//! `aigent_runtime::tool_loop::execute_tool_calls`'s order-preserving
//! parallel execution, generalized into the spec's explicit state-machine
//! transitions and re-entrant `WaitingForTools` status instead of the
//! teacher's single opaque loop.
//!
//! Differs from the teacher on purpose (SPEC_FULL.md §4.3): the teacher's
//! last round silently drops the tool list to coax a final text answer
//! out of the model. This engine never does that — exhausting
//! `max_steps` while tool calls are still outstanding is a hard failure,
//! [`FailureReason::StepLimitExceeded`].

use std::sync::Arc;

use vellum_core::{CompletionOptions, Conversation, Message, Result, Role, ToolCall};
use vellum_guardrails::{Guardrail, GuardrailOutcome};
use vellum_provider::Provider;
use vellum_tools::{InvocationStrategy, PendingCall, ToolRegistry};

use crate::cancellation::CancellationToken;
use crate::events::{AgentEvent, EventSink, NullSink};
use crate::handoff::{self, Handoff};
use crate::state::{AgentState, AgentStatus, FailureReason};

/// Immutable configuration for one engine: everything that stays fixed
/// across every step of a run, as opposed to [`AgentState`], which is
/// replaced each step.
pub struct AgentEngine {
    pub model: String,
    pub provider: Arc<dyn Provider>,
    pub registry: Arc<ToolRegistry>,
    pub input_guardrails: Vec<Arc<dyn Guardrail>>,
    pub output_guardrails: Vec<Arc<dyn Guardrail>>,
    pub handoffs: Vec<Handoff>,
    pub max_steps: u32,
    pub tool_strategy: InvocationStrategy,
    pub temperature: Option<f64>,
    pub strict_schema: bool,
    /// This engine's own system message, used as the target side of a
    /// handoff by [`Self::run_chained`] — distinct from the
    /// per-invocation `system_message` passed to [`Self::initialize`].
    pub system_message: Option<String>,
}

impl AgentEngine {
    pub fn new(model: impl Into<String>, provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model: model.into(),
            provider,
            registry,
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            handoffs: Vec::new(),
            max_steps: 25,
            tool_strategy: InvocationStrategy::Sequential,
            temperature: None,
            strict_schema: false,
            system_message: None,
        }
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn with_input_guardrails(mut self, guardrails: Vec<Arc<dyn Guardrail>>) -> Self {
        self.input_guardrails = guardrails;
        self
    }

    pub fn with_output_guardrails(mut self, guardrails: Vec<Arc<dyn Guardrail>>) -> Self {
        self.output_guardrails = guardrails;
        self
    }

    pub fn with_handoffs(mut self, handoffs: Vec<Handoff>) -> Self {
        self.handoffs = handoffs;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Builds the initial [`AgentState`] for `initial_query`.
    pub fn initialize(&self, initial_query: impl Into<String>, system_message: Option<String>) -> Result<AgentState> {
        AgentState::initialize(
            initial_query,
            system_message,
            self.registry.descriptors().into_iter().map(|d| d.name).collect(),
            self.handoffs.iter().map(|h| h.target.clone()).collect(),
        )
    }

    /// Runs `state` to completion (or failure/handoff), emitting events to
    /// `sink` and observing `cancel` at every suspension point. This is
    /// the re-entrant counterpart to [`Self::initialize`] +
    /// repeated [`Self::run_step`] calls.
    pub async fn run(
        &self,
        mut state: AgentState,
        sink: &mut dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AgentState> {
        sink.emit(AgentEvent::AgentStarted);
        // Boundary behavior (spec §8): `maxSteps = 0` returns the
        // initialized state unchanged, still `InProgress` — zero is "no
        // steps allowed," not "already exhausted."
        if self.max_steps == 0 {
            return Ok(state);
        }
        loop {
            if cancel.is_cancelled() {
                state.status = AgentStatus::Failed(FailureReason::Cancelled);
                sink.emit(AgentEvent::AgentFailed { reason: FailureReason::Cancelled });
                return Ok(state);
            }
            if state.status.is_terminal() {
                break;
            }
            state = self.run_step(state, sink, cancel).await?;
        }
        match &state.status {
            AgentStatus::Completed => sink.emit(AgentEvent::AgentCompleted),
            AgentStatus::Failed(reason) => sink.emit(AgentEvent::AgentFailed { reason: reason.clone() }),
            AgentStatus::HandedOff { target } => sink.emit(AgentEvent::HandoffCompleted { target: target.clone() }),
            _ => {}
        }
        Ok(state)
    }

    /// [`Self::run`] without a caller-supplied sink, for callers that
    /// don't want streaming.
    pub async fn run_silent(&self, state: AgentState, cancel: &CancellationToken) -> Result<AgentState> {
        self.run(state, &mut NullSink, cancel).await
    }

    /// [`Self::run`], but a `HandedOff` result is chained into the named
    /// target engine (looked up in `team`) instead of being returned to
    /// the caller — decided Open Question (DESIGN.md): handoffs are
    /// suspended by default ([`Self::run`]); this is the opt-in chained
    /// entry point. Chains repeatedly until a run reaches a terminal
    /// status that isn't itself a further handoff into a known target.
    pub async fn run_chained(
        &self,
        state: AgentState,
        sink: &mut dyn EventSink,
        cancel: &CancellationToken,
        team: &std::collections::HashMap<String, AgentEngine>,
    ) -> Result<AgentState> {
        let mut current = self;
        let mut state = current.run(state, sink, cancel).await?;
        loop {
            let AgentStatus::HandedOff { target } = &state.status else { break };
            let Some(handoff_cfg) = current.handoffs.iter().find(|h| &h.target == target) else { break };
            let Some(next_engine) = team.get(target) else { break };

            let target_state = handoff::fire(
                &state,
                handoff_cfg,
                next_engine.system_message.clone(),
                next_engine.registry.descriptors().into_iter().map(|d| d.name).collect(),
                next_engine.handoffs.iter().map(|h| h.target.clone()).collect(),
            )?;
            sink.emit(AgentEvent::HandoffStarted { target: target.clone() });
            current = next_engine;
            state = current.run(target_state, sink, cancel).await?;
        }
        Ok(state)
    }

    /// Appends a new User message to a previously terminal (`Completed` or
    /// `HandedOff`) conversation and resets `step_count`, producing a
    /// fresh `InProgress` state ready for another [`Self::run`] (spec
    /// §4.3's "continue the conversation" entry point).
    pub fn continue_conversation(&self, mut prior: AgentState, new_user_message: impl Into<String>) -> Result<AgentState> {
        prior.conversation.push(Message::user(new_user_message))?;
        prior.status = AgentStatus::InProgress;
        prior.step_count = 0;
        Ok(prior)
    }

    /// Advances `state` by exactly one step (spec §4.3's
    /// `InProgress`/`WaitingForTools` transitions). Returns a new state;
    /// never mutates `state` in place.
    pub async fn run_step(
        &self,
        mut state: AgentState,
        sink: &mut dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AgentState> {
        if self.max_steps == 0 {
            return Ok(state);
        }
        let step = state.step_count;
        sink.emit(AgentEvent::StepStarted { step });

        if state.step_count >= self.max_steps {
            state.status = AgentStatus::Failed(FailureReason::StepLimitExceeded);
            sink.emit(AgentEvent::StepCompleted { step });
            return Ok(state);
        }

        let result = match state.status {
            AgentStatus::WaitingForTools => self.resolve_pending_tools(state, sink, cancel).await,
            _ => self.advance_in_progress(state, sink, cancel).await,
        };

        let mut state = result?;
        state.step_count += 1;
        sink.emit(AgentEvent::StepCompleted { step });
        Ok(state)
    }

    async fn advance_in_progress(
        &self,
        mut state: AgentState,
        sink: &mut dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AgentState> {
        let Some(user_text) = latest_user_text(&state.conversation) else {
            state.status = AgentStatus::Failed(FailureReason::Other { message: "no user message to act on".into() });
            return Ok(state);
        };

        for guardrail in &self.input_guardrails {
            sink.emit(AgentEvent::InputGuardrailStarted { name: guardrail.name().to_string() });
            let outcome = guardrail.check(&user_text).await?;
            sink.emit(AgentEvent::InputGuardrailCompleted { name: guardrail.name().to_string(), passed: !outcome.is_reject() });
            if let GuardrailOutcome::Reject { reason } = outcome {
                state.status = AgentStatus::Failed(FailureReason::GuardrailRejected { reason });
                return Ok(state);
            }
        }

        if cancel.is_cancelled() {
            state.status = AgentStatus::Failed(FailureReason::Cancelled);
            return Ok(state);
        }

        let options = CompletionOptions::new(self.model.clone(), state.conversation.clone())
            .with_tools(self.registry.definitions())
            .with_tool_choice(Default::default());
        let options = match self.temperature {
            Some(t) => options.with_temperature(t),
            None => options,
        };
        let mut options = options;
        options.strict_schema = self.strict_schema;

        let completion = tokio::select! {
            result = self.provider.complete(options) => result,
            _ = cancel.cancelled() => {
                state.status = AgentStatus::Failed(FailureReason::Cancelled);
                return Ok(state);
            }
        };
        let completion = match completion {
            Ok(c) => c,
            Err(e) => {
                state.status = AgentStatus::Failed(FailureReason::ProviderError { message: e.to_string() });
                return Ok(state);
            }
        };

        if completion.has_tool_calls() {
            state.conversation.push(Message::assistant_tool_calls(completion.tool_calls))?;
            state.status = AgentStatus::WaitingForTools;
            return Ok(state);
        }

        let text = completion.content.unwrap_or_default();
        sink.emit(AgentEvent::TextComplete { text: text.clone() });

        if let Some(handoff) = handoff::find_triggered(&self.handoffs, &text) {
            sink.emit(AgentEvent::HandoffStarted { target: handoff.target.clone() });
            state.conversation.push(Message::assistant(text))?;
            state = handoff::mark_handed_off(state, handoff);
            return Ok(state);
        }

        let mut final_text = text;
        for guardrail in &self.output_guardrails {
            sink.emit(AgentEvent::OutputGuardrailStarted { name: guardrail.name().to_string() });
            let outcome = guardrail.check(&final_text).await?;
            sink.emit(AgentEvent::OutputGuardrailCompleted { name: guardrail.name().to_string(), passed: !outcome.is_reject() });
            match outcome {
                GuardrailOutcome::Reject { reason } => {
                    state.status = AgentStatus::Failed(FailureReason::GuardrailRejected { reason });
                    return Ok(state);
                }
                GuardrailOutcome::Transform { content } => final_text = content,
                GuardrailOutcome::Pass => {}
            }
        }

        state.conversation.push(Message::assistant(final_text))?;
        state.status = AgentStatus::Completed;
        Ok(state)
    }

    /// Resolves every outstanding tool call (spec §4.3's `WaitingForTools`
    /// transition). A handler failure is not fatal to the run — its error
    /// becomes the Tool message body, same as `tool_loop::execute_tool_calls`
    /// does for the teacher — only guardrail rejection and step-limit
    /// exhaustion are fatal.
    async fn resolve_pending_tools(
        &self,
        mut state: AgentState,
        sink: &mut dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AgentState> {
        let Some(assistant_msg) = state.conversation.messages().iter().rev().find(|m| m.role == Role::Assistant) else {
            state.status = AgentStatus::Failed(FailureReason::Other { message: "no assistant message raised the pending tool calls".into() });
            return Ok(state);
        };
        let calls: Vec<ToolCall> = assistant_msg.tool_calls.clone();
        let pending_ids: std::collections::HashSet<&str> = state.conversation.pending_tool_call_ids().into_iter().collect();
        let calls: Vec<ToolCall> = calls.into_iter().filter(|c| pending_ids.contains(c.id.as_str())).collect();

        for call in &calls {
            sink.emit(AgentEvent::ToolCallStarted { id: call.id.clone(), name: call.name.clone() });
        }

        let pending: Vec<PendingCall> = calls
            .iter()
            .map(|c| PendingCall { id: c.id.clone(), name: c.name.clone(), arguments: Some(c.arguments.clone()) })
            .collect();

        let outcomes = tokio::select! {
            outcomes = self.registry.invoke_batch(pending, self.tool_strategy) => outcomes,
            _ = cancel.cancelled() => {
                state.status = AgentStatus::Failed(FailureReason::Cancelled);
                return Ok(state);
            }
        };

        let outcomes_by_id: std::collections::HashMap<String, std::result::Result<serde_json::Value, vellum_core::Error>> =
            outcomes.into_iter().map(|o| (o.id, o.result)).collect();

        // Appended in the original declaration order from `calls`, not in
        // whatever order `invoke_batch` happened to finish them.
        for call in &calls {
            let outcome = outcomes_by_id.get(&call.id).expect("every submitted call has exactly one outcome");
            let body = match outcome {
                Ok(value) => {
                    let rendered = value.to_string();
                    sink.emit(AgentEvent::ToolCallCompleted { id: call.id.clone(), output: rendered.clone() });
                    rendered
                }
                Err(e) => {
                    sink.emit(AgentEvent::ToolCallFailed { id: call.id.clone(), error: e.to_string() });
                    format!("error: {e}")
                }
            };
            state.conversation.push(Message::tool_result(call.id.clone(), body).with_name(call.name.clone()))?;
        }

        state.status = AgentStatus::InProgress;
        Ok(state)
    }
}

fn latest_user_text(conversation: &Conversation) -> Option<String> {
    conversation.messages().iter().rev().find(|m| m.role == Role::User)?.content.clone()
}
