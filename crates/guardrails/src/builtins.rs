//! Built-in guardrail kinds (spec §4.5). Each is independently small and
//! independently testable, matching the dispatch style of
//! `aigent_tools::Tool`'s `#[async_trait]` implementors.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use vellum_core::Result;
use vellum_provider::Provider;

use crate::guardrail::Guardrail;
use crate::outcome::GuardrailOutcome;

/// Rejects content longer than `max_chars`.
pub struct LengthCheck {
    pub max_chars: usize,
}

#[async_trait]
impl Guardrail for LengthCheck {
    fn name(&self) -> &str {
        "length_check"
    }

    async fn check(&self, content: &str) -> Result<GuardrailOutcome> {
        if content.chars().count() > self.max_chars {
            Ok(GuardrailOutcome::Reject {
                reason: format!("content exceeds {} characters", self.max_chars),
            })
        } else {
            Ok(GuardrailOutcome::Pass)
        }
    }
}

/// Either requires content to match `pattern` or rejects any match,
/// depending on `should_match`.
pub struct RegexValidator {
    pub name: String,
    pub pattern: Regex,
    pub should_match: bool,
}

impl RegexValidator {
    pub fn must_match(name: impl Into<String>, pattern: Regex) -> Self {
        Self { name: name.into(), pattern, should_match: true }
    }

    pub fn must_not_match(name: impl Into<String>, pattern: Regex) -> Self {
        Self { name: name.into(), pattern, should_match: false }
    }
}

#[async_trait]
impl Guardrail for RegexValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, content: &str) -> Result<GuardrailOutcome> {
        let matched = self.pattern.is_match(content);
        if matched == self.should_match {
            Ok(GuardrailOutcome::Pass)
        } else {
            let reason = if self.should_match {
                format!("content does not match required pattern /{}/", self.pattern.as_str())
            } else {
                format!("content matches forbidden pattern /{}/", self.pattern.as_str())
            };
            Ok(GuardrailOutcome::Reject { reason })
        }
    }
}

/// Rejects content that does not parse as JSON.
pub struct JsonValidator;

#[async_trait]
impl Guardrail for JsonValidator {
    fn name(&self) -> &str {
        "json_validator"
    }

    async fn check(&self, content: &str) -> Result<GuardrailOutcome> {
        match serde_json::from_str::<serde_json::Value>(content) {
            Ok(_) => Ok(GuardrailOutcome::Pass),
            Err(e) => Ok(GuardrailOutcome::Reject { reason: format!("not valid JSON: {e}") }),
        }
    }
}

/// Redacts any of `blocked_words` (case-insensitive, whole-word) rather
/// than rejecting outright, so it naturally produces `Transform`.
pub struct ProfanityFilter {
    pub blocked_words: Vec<String>,
}

#[async_trait]
impl Guardrail for ProfanityFilter {
    fn name(&self) -> &str {
        "profanity_filter"
    }

    async fn check(&self, content: &str) -> Result<GuardrailOutcome> {
        let mut redacted = content.to_string();
        let mut changed = false;
        for word in &self.blocked_words {
            let pattern = match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if pattern.is_match(&redacted) {
                changed = true;
                redacted = pattern.replace_all(&redacted, "****").into_owned();
            }
        }
        if changed {
            Ok(GuardrailOutcome::Transform { content: redacted })
        } else {
            Ok(GuardrailOutcome::Pass)
        }
    }
}

/// Delegates the pass/reject decision to a model call — "LLM as judge".
pub struct LlmJudge {
    pub name: String,
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub instructions: String,
}

#[async_trait]
impl Guardrail for LlmJudge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, content: &str) -> Result<GuardrailOutcome> {
        use vellum_core::{CompletionOptions, Conversation, Message};

        let mut conversation = Conversation::new();
        conversation.push(Message::system(&self.instructions))?;
        conversation.push(Message::user(format!(
            "Reply with exactly PASS or REJECT:<reason>.\n\nContent:\n{content}"
        )))?;
        let result = self
            .provider
            .complete(CompletionOptions::new(&self.model, conversation))
            .await?;
        let verdict = result.content.unwrap_or_default();
        let verdict = verdict.trim();
        if verdict.eq_ignore_ascii_case("PASS") {
            Ok(GuardrailOutcome::Pass)
        } else {
            let reason = verdict
                .strip_prefix("REJECT:")
                .or_else(|| verdict.strip_prefix("reject:"))
                .unwrap_or(verdict)
                .trim()
                .to_string();
            Ok(GuardrailOutcome::Reject { reason })
        }
    }
}
