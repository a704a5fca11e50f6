//! `AgentState` (spec §3): an immutable snapshot of one agent run. Every
//! engine transition in [`crate::engine`] consumes a state by value and
//! returns a new one — never mutates in place, mirroring the
//! "immutable snapshots vs mutable state" design note (spec §9).

use serde::{Deserialize, Serialize};
use vellum_core::{Conversation, Message};

/// Why a run ended in [`AgentStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FailureReason {
    GuardrailRejected { reason: String },
    StepLimitExceeded,
    ProviderError { message: String },
    Cancelled,
    Other { message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::GuardrailRejected { reason } => write!(f, "guardrail rejected: {reason}"),
            FailureReason::StepLimitExceeded => write!(f, "step limit exceeded"),
            FailureReason::ProviderError { message } => write!(f, "provider error: {message}"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Other { message } => write!(f, "{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentStatus {
    InProgress,
    WaitingForTools,
    Completed,
    Failed(FailureReason),
    HandedOff { target: String },
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed(_) | AgentStatus::HandedOff { .. })
    }
}

/// One immutable snapshot of an agent run (spec §3). `tool_names` and
/// `available_handoffs` are descriptors only — the handlers and trigger
/// predicates they name live in the [`crate::engine::AgentEngine`] that
/// produced this state, not in the state itself, so the state stays plain
/// data and therefore serializable (spec §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub conversation: Conversation,
    pub tool_names: Vec<String>,
    pub initial_query: String,
    pub status: AgentStatus,
    pub logs: Vec<String>,
    pub system_message: Option<String>,
    pub available_handoffs: Vec<String>,
    pub step_count: u32,
}

impl AgentState {
    pub fn initialize(
        initial_query: impl Into<String>,
        system_message: Option<String>,
        tool_names: Vec<String>,
        available_handoffs: Vec<String>,
    ) -> vellum_core::Result<Self> {
        let initial_query = initial_query.into();
        if initial_query.trim().is_empty() {
            return Err(vellum_core::Error::validation("initial_query", "must not be empty"));
        }
        let mut conversation = Conversation::new();
        if let Some(system) = &system_message {
            conversation.push(Message::system(system.clone()))?;
        }
        conversation.push(Message::user(initial_query.clone()))?;

        Ok(Self {
            conversation,
            tool_names,
            initial_query,
            status: AgentStatus::InProgress,
            logs: Vec::new(),
            system_message,
            available_handoffs,
            step_count: 0,
        })
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_rejects_empty_query() {
        let err = AgentState::initialize("   ", None, vec![], vec![]).unwrap_err();
        assert!(matches!(err, vellum_core::Error::Validation { .. }));
    }

    #[test]
    fn initialize_seeds_system_then_user_message() {
        let state = AgentState::initialize("hello", Some("be terse".into()), vec![], vec![]).unwrap();
        assert_eq!(state.conversation.len(), 2);
        assert_eq!(state.status, AgentStatus::InProgress);
        assert_eq!(state.step_count, 0);
    }
}
