//! The Provider Client (spec §4.2, §6): a uniform `Provider` trait with
//! adapters for OpenAI-compatible, Anthropic, and local (Ollama-style)
//! backends, shared retry policy, and manual SSE/NDJSON stream folding.

mod anthropic;
mod ollama;
mod openai;
mod provider;
mod retry;
mod sse;
mod wire;

pub use anthropic::AnthropicProvider;
pub use ollama::LocalProvider;
pub use openai::OpenAiProvider;
pub use provider::{ApiKey, CompletionStream, Provider, ProviderConfig, StreamEvent};
pub use retry::with_retry;
