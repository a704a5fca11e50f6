//! The Agent Engine (spec §4.3): a state-machine runner that drives a
//! conversation forward through the model, the Tool Registry, and
//! Guardrails, with streaming progress events, cooperative cancellation,
//! and crash-safe snapshot persistence.

pub mod cancellation;
pub mod engine;
pub mod events;
pub mod handoff;
pub mod snapshot;
pub mod state;

pub use cancellation::CancellationToken;
pub use engine::AgentEngine;
pub use events::{AgentEvent, CallbackSink, EventChannel, EventSink, NullSink};
pub use handoff::{Handoff, HandoffTrigger};
pub use snapshot::{load_from_path, save_to_path};
pub use state::{AgentState, AgentStatus, FailureReason};
