//! Handoffs (spec §4.3, §4.7): transferring an in-progress run to a
//! different agent. A [`Handoff`] is configuration the engine consults
//! each step; firing one produces a brand-new [`AgentState`] rather than
//! mutating the current one, same as every other transition.

use std::sync::Arc;

use crate::state::{AgentState, AgentStatus};

/// Decides whether a handoff should fire, given the assistant's latest
/// text output. `Keyword` is the common case (a routing agent's system
/// prompt instructs the model to say e.g. "ROUTE_TO: billing"); `Custom`
/// escapes to an arbitrary predicate for anything else.
#[derive(Clone)]
pub enum HandoffTrigger {
    Keyword(String),
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl HandoffTrigger {
    fn matches(&self, assistant_text: &str) -> bool {
        match self {
            HandoffTrigger::Keyword(needle) => assistant_text.to_lowercase().contains(&needle.to_lowercase()),
            HandoffTrigger::Custom(f) => f(assistant_text),
        }
    }
}

impl std::fmt::Debug for HandoffTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandoffTrigger::Keyword(needle) => write!(f, "HandoffTrigger::Keyword({needle:?})"),
            HandoffTrigger::Custom(_) => write!(f, "HandoffTrigger::Custom(<fn>)"),
        }
    }
}

/// Configuration for transferring execution to another agent (spec
/// §4.3). Lives alongside the engine, not inside [`AgentState`] — the
/// state only remembers the *name* of the target it handed off to.
#[derive(Debug, Clone)]
pub struct Handoff {
    pub target: String,
    pub reason: Option<String>,
    /// If true, the target inherits the full prior conversation. If
    /// false, the target starts from only the latest User message —
    /// spec's "fresh start" handoff mode.
    pub preserve_context: bool,
    /// If true, the source's system message is carried over onto the
    /// target (falling back to the target's own if the source has none).
    /// If false (default), the target keeps its own system message and
    /// the source's is dropped (Open Question, decided in DESIGN.md).
    pub transfer_system_message: bool,
    pub trigger: HandoffTrigger,
}

impl Handoff {
    pub fn new(target: impl Into<String>, trigger: HandoffTrigger) -> Self {
        Self {
            target: target.into(),
            reason: None,
            preserve_context: true,
            transfer_system_message: false,
            trigger,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn preserve_context(mut self, preserve: bool) -> Self {
        self.preserve_context = preserve;
        self
    }

    pub fn transfer_system_message(mut self, transfer: bool) -> Self {
        self.transfer_system_message = transfer;
        self
    }
}

/// Returns the first handoff (in declaration order) whose trigger
/// matches `assistant_text`, if any.
pub fn find_triggered<'a>(handoffs: &'a [Handoff], assistant_text: &str) -> Option<&'a Handoff> {
    handoffs.iter().find(|h| h.trigger.matches(assistant_text))
}

/// Fires `handoff` against `source`, producing the new [`AgentState`]
/// targeted at `handoff.target` (spec §4.7): its conversation is rebuilt
/// from the resolved system message (see [`Handoff::transfer_system_message`])
/// plus whatever history `preserve_context` says to carry over.
pub fn fire(
    source: &AgentState,
    handoff: &Handoff,
    target_system_message: Option<String>,
    target_tool_names: Vec<String>,
    target_available_handoffs: Vec<String>,
) -> vellum_core::Result<AgentState> {
    // Decided Open Question (DESIGN.md): with `transfer_system_message =
    // false`, the target's own system message wins and the source's is
    // dropped rather than concatenated, keeping the "at most one System
    // message" invariant intact without guessing how to merge two. With
    // it `true`, the source's system message is carried over the target's.
    let system_message = if handoff.transfer_system_message {
        source.system_message.clone().or(target_system_message)
    } else {
        target_system_message
    };

    // Carried-over messages, stripped of whatever System message the
    // source conversation had — the resolved `system_message` above is
    // the single source of truth for the target's System message, so it
    // is always rebuilt fresh rather than patched in place.
    let carried: Vec<vellum_core::Message> = if handoff.preserve_context {
        source.conversation.messages().iter().filter(|m| m.role != vellum_core::Role::System).cloned().collect()
    } else {
        source
            .conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == vellum_core::Role::User)
            .cloned()
            .into_iter()
            .collect()
    };

    let mut conversation = vellum_core::Conversation::new();
    if let Some(system) = &system_message {
        conversation.push(vellum_core::Message::system(system.clone()))?;
    }
    for message in carried {
        conversation.push(message)?;
    }

    Ok(AgentState {
        conversation,
        tool_names: target_tool_names,
        initial_query: source.initial_query.clone(),
        status: AgentStatus::InProgress,
        logs: source.logs.clone(),
        system_message,
        available_handoffs: target_available_handoffs,
        step_count: 0,
    })
}

/// Marks `source` as handed off to `handoff.target`, for the caller to
/// inspect before deciding whether to chain execution into the target
/// immediately ([`fire`]) or suspend and let the caller drive the next
/// invocation (spec's chained-vs-suspended Open Question, decided in
/// DESIGN.md: suspended by default).
pub fn mark_handed_off(mut source: AgentState, handoff: &Handoff) -> AgentState {
    source.status = AgentStatus::HandedOff { target: handoff.target.clone() };
    if let Some(reason) = &handoff.reason {
        source.log(format!("handed off to '{}': {reason}", handoff.target));
    } else {
        source.log(format!("handed off to '{}'", handoff.target));
    }
    source
}
