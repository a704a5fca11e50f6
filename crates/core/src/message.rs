//! Conversation data model (spec §3): roles, messages, tool calls, and the
//! append-only conversation log with its pairing invariant. Mirrors the
//! shape of `aigent_llm::{ChatRole, ChatMessage}` but adds the validation
//! the spec requires and the teacher's client code never enforced.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A provider's request to invoke a tool, as surfaced on an `Assistant`
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single turn in a [`Conversation`]. Only `Assistant` messages carry
/// `tool_calls`; only `Tool` messages carry `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Append-only message log, enforcing the two structural invariants named
/// in spec §3: at most one leading `System` message, and every `Tool`
/// message answers exactly one outstanding tool call raised by the most
/// recent `Assistant` message that has not yet been fully answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool call ids raised by the most recent `Assistant` message that do
    /// not yet have a matching `Tool` response appended after them.
    pub fn pending_tool_call_ids(&self) -> Vec<&str> {
        let Some(last_assistant_idx) = self.messages.iter().rposition(|m| m.role == Role::Assistant)
        else {
            return Vec::new();
        };
        let raised = &self.messages[last_assistant_idx].tool_calls;
        if raised.is_empty() {
            return Vec::new();
        }
        let answered: std::collections::HashSet<&str> = self.messages[last_assistant_idx + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        raised
            .iter()
            .map(|tc| tc.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    /// Appends `message`, validating it against the conversation's current
    /// state. Never mutates or removes an existing message.
    pub fn push(&mut self, message: Message) -> Result<()> {
        self.validate_append(&message)?;
        self.messages.push(message);
        Ok(())
    }

    fn validate_append(&self, message: &Message) -> Result<()> {
        match message.role {
            Role::System => {
                if self.messages.iter().any(|m| m.role == Role::System) {
                    return Err(Error::validation(
                        "role",
                        "a conversation may have at most one System message",
                    ));
                }
            }
            Role::Tool => {
                let Some(tool_call_id) = message.tool_call_id.as_deref() else {
                    return Err(Error::validation(
                        "tool_call_id",
                        "a Tool message must carry the id of the call it answers",
                    ));
                };
                if !self.pending_tool_call_ids().contains(&tool_call_id) {
                    return Err(Error::validation(
                        "tool_call_id",
                        format!("'{tool_call_id}' does not match an outstanding tool call"),
                    ));
                }
            }
            Role::User | Role::Assistant => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_second_system_message() {
        let mut c = Conversation::new();
        c.push(Message::system("be nice")).unwrap();
        let err = c.push(Message::system("again")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn system_message_allowed_later_position_is_still_rejected() {
        let mut c = Conversation::new();
        c.push(Message::user("hi")).unwrap();
        let err = c.push(Message::system("late")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn tool_message_must_match_pending_call() {
        let mut c = Conversation::new();
        c.push(Message::user("weather?")).unwrap();
        c.push(Message::assistant_tool_calls(vec![ToolCall::new(
            "call_1",
            "get_weather",
            json!({"city": "Lyon"}),
        )]))
        .unwrap();
        let err = c.push(Message::tool_result("call_unknown", "72F")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        c.push(Message::tool_result("call_1", "72F")).unwrap();
        assert!(c.pending_tool_call_ids().is_empty());
    }

    #[test]
    fn tool_message_without_any_pending_call_is_rejected() {
        let mut c = Conversation::new();
        c.push(Message::user("hi")).unwrap();
        let err = c.push(Message::tool_result("call_1", "x")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn pending_tool_calls_tracks_partial_answers() {
        let mut c = Conversation::new();
        c.push(Message::assistant_tool_calls(vec![
            ToolCall::new("a", "t1", json!({})),
            ToolCall::new("b", "t2", json!({})),
        ]))
        .unwrap();
        assert_eq!(c.pending_tool_call_ids(), vec!["a", "b"]);
        c.push(Message::tool_result("a", "done")).unwrap();
        assert_eq!(c.pending_tool_call_ids(), vec!["b"]);
    }
}
