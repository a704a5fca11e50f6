//! Guardrails (spec §4.5): pluggable content checks run before and after
//! Agent Engine steps, composable with `all`/`any`/`sequence` without ever
//! mutating the content they're checking.

mod builtins;
mod compose;
mod guardrail;
mod outcome;

pub use builtins::{JsonValidator, LengthCheck, LlmJudge, ProfanityFilter, RegexValidator};
pub use compose::{all, any, sequence};
pub use guardrail::Guardrail;
pub use outcome::GuardrailOutcome;
