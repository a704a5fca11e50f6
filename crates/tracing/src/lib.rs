//! Structured tracing for the framework (spec §6 `tracingMode`): backend
//! selection plus a thin helper the Agent Engine uses to record a
//! transition consistently, regardless of which backend is active.
//!
//! Grounded on the `tracing`/`tracing-subscriber` call sites scattered
//! across the teacher's crates (`memory::index`, `memory::event_log`,
//! `runtime::tool_loop`); no single teacher file implements a
//! backend-selection layer, so the dispatch table here is new, modeled on
//! `aigent_llm::Provider`/`LlmRouter`'s enum-plus-match dispatch.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use vellum_core::{Error, Result};

/// Where structured trace events are sent (spec §6). `OpenTelemetry` and
/// `Langfuse` are accepted so configuration round-trips, but the actual
/// OTLP/Langfuse wire export is out of scope (§1 non-goals exclude
/// implementing external backend protocols) — both fall back to the
/// console layer with a one-time warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingBackend {
    #[default]
    Console,
    OpenTelemetry,
    Langfuse,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub backend: TracingBackend,
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"info"` or
    /// `"vellum_agent=debug,vellum_provider=info"`.
    pub filter: String,
    /// Backend-specific collector endpoint (spec §6: "tracingMode plus
    /// backend-specific endpoint/keys"). Unused by `Console`/`None`; read
    /// but not dialed by `OpenTelemetry`/`Langfuse` until those exporters
    /// are wired.
    pub endpoint: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { backend: TracingBackend::default(), filter: "info".to_string(), endpoint: None }
    }
}

/// Installs the global `tracing` subscriber. Safe to call once per
/// process; a second call returns `Error::Configuration`.
pub fn install(config: &TracingConfig) -> Result<()> {
    if config.backend == TracingBackend::None {
        return Ok(());
    }
    if matches!(config.backend, TracingBackend::OpenTelemetry | TracingBackend::Langfuse) {
        eprintln!(
            "vellum-tracing: backend {:?} has no wire exporter in this build, falling back to console",
            config.backend
        );
    }
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| Error::configuration([format!("tracing.filter: {e}")]))?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Configuration { keys: vec![format!("tracing already installed: {e}")] })
}

/// Records one Agent Engine state transition as a structured `tracing`
/// event, independent of backend — callers pass the transition name and
/// a flat field list (kept as strings since the event destinations here
/// are all text-oriented: console, and eventually OTLP/Langfuse spans).
pub fn record_transition(transition: &str, fields: &[(&str, &str)]) {
    tracing::info!(transition, ?fields, "agent state transition");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_backend_is_a_no_op() {
        let config = TracingConfig { backend: TracingBackend::None, filter: "info".into() };
        assert!(install(&config).is_ok());
    }

    #[test]
    fn invalid_filter_directive_is_a_configuration_error() {
        let config = TracingConfig { backend: TracingBackend::Console, filter: "not a valid directive!!".into() };
        let err = install(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
