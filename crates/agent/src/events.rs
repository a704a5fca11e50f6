//! Streaming events (spec §4.3, §9): the engine narrates each run as a
//! sequence of [`AgentEvent`]s satisfying the bracketing invariant (spec
//! §8 invariant 3) — every `StepStarted` is matched by a later
//! `StepCompleted`, every `ToolCallStarted(id)` by exactly one
//! `ToolCallCompleted(id)`/`ToolCallFailed(id)` before that step closes,
//! and the whole run is bracketed by `AgentStarted` .. `{AgentCompleted,
//! AgentFailed}`.
//!
//! Grounded on `aigent_runtime::events::BackendEvent`, generalized from
//! its flat `Token`/`ToolCallStart`/`ToolCallEnd`/`Done` shape into the
//! richer, fully-bracketed event list the spec names.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::state::FailureReason;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentEvent {
    AgentStarted,
    StepStarted { step: u32 },
    StepCompleted { step: u32 },
    TextDelta { text: String },
    TextComplete { text: String },
    ToolCallStarted { id: String, name: String },
    ToolCallCompleted { id: String, output: String },
    ToolCallFailed { id: String, error: String },
    InputGuardrailStarted { name: String },
    InputGuardrailCompleted { name: String, passed: bool },
    OutputGuardrailStarted { name: String },
    OutputGuardrailCompleted { name: String, passed: bool },
    HandoffStarted { target: String },
    HandoffCompleted { target: String },
    AgentCompleted,
    AgentFailed { reason: FailureReason },
}

/// Push-based sink an [`crate::engine::AgentEngine`] run reports its
/// events to. An `mpsc::Sender` wrapped as a [`ReceiverStream`] (see
/// [`EventChannel`]) implements this, as does any caller-supplied
/// callback closure via [`CallbackSink`].
pub trait EventSink: Send {
    fn emit(&mut self, event: AgentEvent);
}

/// A sink that forwards every event to a closure — the "push callback"
/// form named in spec §9's streaming design note.
pub struct CallbackSink<F: FnMut(AgentEvent) + Send>(pub F);

impl<F: FnMut(AgentEvent) + Send> EventSink for CallbackSink<F> {
    fn emit(&mut self, event: AgentEvent) {
        (self.0)(event)
    }
}

/// A sink that drops every event. Used when a caller doesn't want
/// streaming at all, e.g. in [`crate::engine::AgentEngine::run`]'s
/// non-streaming entry point.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: AgentEvent) {}
}

/// The "pull iterator" form named in spec §9: a bounded channel whose
/// sender half is handed to the engine as an [`EventSink`], and whose
/// receiver half the caller consumes as a [`futures::Stream`].
pub struct EventChannel {
    sender: mpsc::Sender<AgentEvent>,
}

impl EventChannel {
    /// Returns the sink half (for the engine) and the stream half (for
    /// the caller) of a channel with room for `capacity` buffered events.
    pub fn new(capacity: usize) -> (Self, ReceiverStream<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { sender: tx }, ReceiverStream::new(rx))
    }
}

impl EventSink for EventChannel {
    fn emit(&mut self, event: AgentEvent) {
        // The receiver may have been dropped (caller stopped listening);
        // that's not a run failure, so the send error is swallowed.
        let _ = self.sender.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn event_channel_delivers_emitted_events_in_order() {
        let (mut sink, mut stream) = EventChannel::new(8);
        sink.emit(AgentEvent::AgentStarted);
        sink.emit(AgentEvent::StepStarted { step: 0 });
        sink.emit(AgentEvent::AgentCompleted);
        drop(sink);

        let collected: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(
            collected,
            vec![AgentEvent::AgentStarted, AgentEvent::StepStarted { step: 0 }, AgentEvent::AgentCompleted]
        );
    }

    #[test]
    fn callback_sink_forwards_every_event() {
        let mut seen = Vec::new();
        {
            let mut sink = CallbackSink(|e: AgentEvent| seen.push(e));
            sink.emit(AgentEvent::AgentStarted);
            sink.emit(AgentEvent::AgentCompleted);
        }
        assert_eq!(seen, vec![AgentEvent::AgentStarted, AgentEvent::AgentCompleted]);
    }
}
