//! The uniform `Provider` seam (spec §4.2, §6) every adapter implements.

use async_trait::async_trait;
use std::pin::Pin;
use vellum_core::{CompletionOptions, CompletionResult, FinishReason, Result, ToolCall, Usage};

/// One event raised while streaming a completion. Adapters guarantee:
/// every `TextDelta` for a given answer arrives in order, `ToolCallPartial`
/// fragments for one call index arrive before its `ToolCallComplete`, and
/// `Usage`/`Finish` are always the last two events (spec §4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCallPartial {
        index: usize,
        id_fragment: Option<String>,
        name_fragment: Option<String>,
        arguments_fragment: String,
    },
    ToolCallComplete(ToolCall),
    Usage(Usage),
    Finish(FinishReason),
}

pub type CompletionStream = Pin<Box<dyn futures::Stream<Item = Result<StreamEvent>> + Send>>;

/// Redacted on `Debug`/`Display` so a stray `{:?}` in a log line never
/// leaks credentials (spec §7).
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Connection details for one configured provider (spec §6). Variants
/// correspond to the three adapters this crate ships.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAiCompatible { base_url: String, api_key: ApiKey },
    Anthropic { base_url: String, api_key: ApiKey },
    Local { base_url: String },
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, options: CompletionOptions) -> Result<CompletionResult>;

    async fn stream(&self, options: CompletionOptions) -> Result<CompletionStream>;

    /// Embeds text for the Memory/Retrieval component (spec §4.4). Returns
    /// `Error::Processing` for adapters whose upstream has no embeddings
    /// endpoint (e.g. Anthropic, at time of writing).
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
