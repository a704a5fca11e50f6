//! The three-way result every guardrail produces (spec §4.5).

#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailOutcome {
    Pass,
    Reject { reason: String },
    /// The guardrail accepts the content but rewrites it — e.g. redacting
    /// a match, truncating to a length cap.
    Transform { content: String },
}

impl GuardrailOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, GuardrailOutcome::Pass)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, GuardrailOutcome::Reject { .. })
    }

    /// The content a caller should use going forward: the transformed
    /// value if this outcome carries one, otherwise the original.
    pub fn resolved_content<'a>(&'a self, original: &'a str) -> &'a str {
        match self {
            GuardrailOutcome::Transform { content } => content,
            _ => original,
        }
    }
}
