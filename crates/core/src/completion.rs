//! Provider-facing request/response shapes (spec §4.2, §6): what an Agent
//! Engine step asks a [`crate::message::Conversation`] turned into, and
//! what comes back. Provider adapters translate these to and from each
//! vendor's wire format; nothing in this module is vendor-specific.

use serde::{Deserialize, Serialize};

use crate::message::{Conversation, ToolCall};
use crate::schema::Schema;

/// A single tool made available to the model for one completion call.
/// Distinct from the Tool Registry's richer `ToolDescriptor` (which also
/// carries the handler) — this is just the wire-facing declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Schema,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    /// Force a specific tool by name.
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// Token accounting for one completion call. `estimated` is set by
/// adapters that had to fall back to a local token-count approximation
/// because the provider's response omitted usage (spec §4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub estimated: bool,
}

impl Usage {
    pub fn estimate(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            estimated: true,
        }
    }
}

/// Parameters for one `Provider::complete`/`stream` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub conversation: Conversation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Ask the adapter to render tool schemas in "strict" mode
    /// ([`Schema::to_json_schema`]'s `strict` flag) where the provider
    /// supports it.
    #[serde(default)]
    pub strict_schema: bool,
}

impl CompletionOptions {
    pub fn new(model: impl Into<String>, conversation: Conversation) -> Self {
        Self {
            model: model.into(),
            conversation,
            tools: Vec::new(),
            tool_choice: ToolChoice::default(),
            temperature: None,
            max_tokens: None,
            reasoning_effort: None,
            strict_schema: false,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The result of one non-streaming completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl CompletionResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_choice_defaults_to_auto() {
        assert_eq!(ToolChoice::default(), ToolChoice::Auto);
    }

    #[test]
    fn usage_estimate_sums_totals_and_flags_estimated() {
        let u = Usage::estimate(10, 5);
        assert_eq!(u.total_tokens, 15);
        assert!(u.estimated);
    }

    #[test]
    fn completion_result_reports_tool_calls_presence() {
        let r = CompletionResult {
            content: None,
            tool_calls: vec![ToolCall::new("a", "t", serde_json::json!({}))],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::default(),
        };
        assert!(r.has_tool_calls());
    }
}
