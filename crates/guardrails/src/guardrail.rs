//! The `Guardrail` seam (spec §4.5): a named, independently testable check
//! over a piece of text, used to validate both agent input and output.

use async_trait::async_trait;
use vellum_core::Result;

use crate::outcome::GuardrailOutcome;

#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, content: &str) -> Result<GuardrailOutcome>;
}
