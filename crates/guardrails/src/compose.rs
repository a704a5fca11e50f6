//! Composition operators over guardrails (spec §4.5). None of these ever
//! mutate the caller's `content` argument — each returns a fresh
//! [`GuardrailOutcome`] built from owned strings.

use vellum_core::Result;

use crate::guardrail::Guardrail;
use crate::outcome::GuardrailOutcome;

/// Passes only if every guardrail passes. The first rejection short
/// circuits; a `Transform` from one guardrail feeds the content seen by
/// the next, and the outermost `Transform` (if any) reflects the
/// cumulative effect.
pub async fn all(guardrails: &[Box<dyn Guardrail>], content: &str) -> Result<GuardrailOutcome> {
    let mut current = content.to_string();
    let mut transformed = false;
    for guardrail in guardrails {
        match guardrail.check(&current).await? {
            GuardrailOutcome::Pass => {}
            GuardrailOutcome::Reject { reason } => {
                return Ok(GuardrailOutcome::Reject { reason: format!("{}: {reason}", guardrail.name()) })
            }
            GuardrailOutcome::Transform { content: next } => {
                transformed = true;
                current = next;
            }
        }
    }
    if transformed {
        Ok(GuardrailOutcome::Transform { content: current })
    } else {
        Ok(GuardrailOutcome::Pass)
    }
}

/// Passes if any guardrail passes (or transforms); rejects only if every
/// guardrail rejects, collecting all reasons.
pub async fn any(guardrails: &[Box<dyn Guardrail>], content: &str) -> Result<GuardrailOutcome> {
    let mut reasons = Vec::new();
    for guardrail in guardrails {
        match guardrail.check(content).await? {
            GuardrailOutcome::Pass => return Ok(GuardrailOutcome::Pass),
            GuardrailOutcome::Transform { content } => return Ok(GuardrailOutcome::Transform { content }),
            GuardrailOutcome::Reject { reason } => reasons.push(format!("{}: {reason}", guardrail.name())),
        }
    }
    Ok(GuardrailOutcome::Reject { reason: reasons.join("; ") })
}

/// Runs every guardrail in order regardless of intermediate rejections,
/// threading each `Transform` into the next guardrail's input — useful for
/// a pipeline of independent rewrites (e.g. profanity filter, then length
/// check) where a later check should see the earlier rewrite.
pub async fn sequence(guardrails: &[Box<dyn Guardrail>], content: &str) -> Result<GuardrailOutcome> {
    let mut current = content.to_string();
    let mut rejection = None;
    for guardrail in guardrails {
        match guardrail.check(&current).await? {
            GuardrailOutcome::Pass => {}
            GuardrailOutcome::Transform { content: next } => current = next,
            GuardrailOutcome::Reject { reason } => {
                rejection.get_or_insert_with(Vec::new).push(format!("{}: {reason}", guardrail.name()));
            }
        }
    }
    match rejection {
        Some(reasons) => Ok(GuardrailOutcome::Reject { reason: reasons.join("; ") }),
        None if current != content => Ok(GuardrailOutcome::Transform { content: current }),
        None => Ok(GuardrailOutcome::Pass),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{LengthCheck, ProfanityFilter, RegexValidator};
    use regex::Regex;

    #[tokio::test]
    async fn all_short_circuits_on_first_rejection() {
        let guardrails: Vec<Box<dyn Guardrail>> = vec![
            Box::new(LengthCheck { max_chars: 3 }),
            Box::new(RegexValidator::must_match("digits", Regex::new(r"^\d+$").unwrap())),
        ];
        let outcome = all(&guardrails, "abcdef").await.unwrap();
        assert!(outcome.is_reject());
    }

    #[tokio::test]
    async fn all_passes_when_every_guardrail_passes() {
        let guardrails: Vec<Box<dyn Guardrail>> = vec![Box::new(LengthCheck { max_chars: 10 })];
        assert_eq!(all(&guardrails, "short").await.unwrap(), GuardrailOutcome::Pass);
    }

    #[tokio::test]
    async fn any_passes_if_one_guardrail_passes() {
        let guardrails: Vec<Box<dyn Guardrail>> = vec![
            Box::new(LengthCheck { max_chars: 1 }),
            Box::new(LengthCheck { max_chars: 100 }),
        ];
        assert_eq!(any(&guardrails, "medium length").await.unwrap(), GuardrailOutcome::Pass);
    }

    #[tokio::test]
    async fn any_rejects_only_when_all_reject() {
        let guardrails: Vec<Box<dyn Guardrail>> = vec![Box::new(LengthCheck { max_chars: 1 })];
        assert!(any(&guardrails, "too long for this").await.unwrap().is_reject());
    }

    #[tokio::test]
    async fn sequence_threads_transform_into_next_check() {
        let guardrails: Vec<Box<dyn Guardrail>> = vec![
            Box::new(ProfanityFilter { blocked_words: vec!["darn".into()] }),
            Box::new(LengthCheck { max_chars: 100 }),
        ];
        let original = "that darn bug";
        let outcome = sequence(&guardrails, original).await.unwrap();
        assert_eq!(outcome, GuardrailOutcome::Transform { content: "that **** bug".into() });
        assert_eq!(original, "that darn bug", "composition must not mutate the caller's content");
    }
}
