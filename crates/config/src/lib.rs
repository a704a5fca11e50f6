//! Typed configuration surface (spec §6): the *only* recognized external
//! settings are provider selection, embedding provider selection, and the
//! tracing backend. Everything else is caller code, not configuration.
//!
//! Grounded on `aigent_config::AppConfig::load_from`/`save_to` (TOML file,
//! `#[serde(default)]` sections so a partial or missing file still loads,
//! environment variables layered on top at load time). The boundary this
//! crate exists to enforce (spec §9 "Global configuration"): everything
//! below `vellum-config` accepts fully typed values and never calls
//! `std::env::var` itself — only this crate, and only for the handful of
//! settings spec §6 calls out as edge-only (API keys, base URL overrides).

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vellum_core::{Error, Result};
use vellum_provider::{ApiKey, ProviderConfig};
use vellum_tracing::TracingConfig;

/// Which upstream a [`ProviderSettings`]/[`EmbeddingSettings`] section
/// names. Mirrors `vellum_provider::ProviderConfig`'s variants one level
/// up, as plain data so it round-trips through TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Local,
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::OpenAi
    }
}

/// Provider selection (spec §6): `provider`, `baseUrl`, `apiKey`, `model`,
/// `organizationId?`, `timeoutMs`. `api_key` is deliberately **not**
/// serialized — it is read from the environment at [`AppConfig::load_from`]
/// time, same as the teacher's `OPENROUTER_API_KEY` lookup in
/// `aigent_llm`, and never lands in the TOML file `save_to` writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub organization_id: Option<String>,
    pub timeout_ms: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            organization_id: None,
            timeout_ms: 30_000,
            api_key: None,
        }
    }
}

/// Embedding provider selection (spec §6): `embeddingProvider`,
/// `embeddingModel`, `embeddingBaseUrl?`. Kept as its own section rather
/// than folded into [`ProviderSettings`] because the spec allows the
/// embedding and completion paths to hit different providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub embedding_provider: ProviderKind,
    pub embedding_model: String,
    pub embedding_base_url: Option<String>,
    #[serde(skip)]
    pub embedding_api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            embedding_provider: ProviderKind::default(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_base_url: None,
            embedding_api_key: None,
        }
    }
}

/// The whole recognized configuration surface (spec §6). Everything a
/// `vellum-*` crate needs beyond this is passed in by caller code, not
/// read from a file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderSettings,
    pub embedding: EmbeddingSettings,
    pub tracing: TracingConfig,
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn api_key_env_var(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
        ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        ProviderKind::Local => None,
    }
}

impl AppConfig {
    /// Loads configuration from `path`, falling back to defaults for a
    /// missing file (same as the teacher: `fs::read_to_string` failure is
    /// silently absorbed, a malformed file is not). Environment variables
    /// are then layered on top — this is the one place in the whole crate
    /// graph allowed to call `std::env::var` (spec §6, §9).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)
                .map_err(|e| Error::configuration([format!("parsing config file: {e}")]))?;
        }

        if let Some(url) = env_non_empty("OLLAMA_BASE_URL") {
            if config.provider.provider == ProviderKind::Local {
                config.provider.base_url = url;
            }
        }
        if let Some(url) = env_non_empty("OPENAI_BASE_URL") {
            if config.provider.provider == ProviderKind::OpenAi {
                config.provider.base_url = url;
            }
        }
        if let Some(url) = env_non_empty("ANTHROPIC_BASE_URL") {
            if config.provider.provider == ProviderKind::Anthropic {
                config.provider.base_url = url;
            }
        }

        if let Some(var) = api_key_env_var(config.provider.provider) {
            config.provider.api_key = env_non_empty(var);
        }
        if let Some(var) = api_key_env_var(config.embedding.embedding_provider) {
            config.embedding.embedding_api_key = env_non_empty(var);
        }

        Ok(config)
    }

    /// Writes the recognized, non-secret portion of the configuration back
    /// to `path` as TOML. `api_key`/`embedding_api_key` are skipped by
    /// `serde` and never reach disk.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(|e| Error::configuration([format!("creating config directory: {e}")]))?;
        }
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| Error::configuration([format!("rendering config file: {e}")]))?;
        fs::write(path, rendered).map_err(|e| Error::configuration([format!("writing config file: {e}")]))?;
        Ok(())
    }

    /// Builds the [`ProviderConfig`] the completion path's adapter needs,
    /// failing with `Error::Configuration` if a required API key never
    /// showed up in the environment (spec §7 `Configuration(keys)`).
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        build_provider_config(self.provider.provider, &self.provider.base_url, self.provider.api_key.as_deref())
    }

    /// Builds the [`ProviderConfig`] the embedding path's adapter needs.
    /// May name a different upstream than [`Self::provider_config`].
    pub fn embedding_provider_config(&self) -> Result<ProviderConfig> {
        let base_url = self
            .embedding
            .embedding_base_url
            .clone()
            .unwrap_or_else(|| self.provider.base_url.clone());
        build_provider_config(self.embedding.embedding_provider, &base_url, self.embedding.embedding_api_key.as_deref())
    }
}

fn build_provider_config(kind: ProviderKind, base_url: &str, api_key: Option<&str>) -> Result<ProviderConfig> {
    match kind {
        ProviderKind::OpenAi => {
            let key = api_key.ok_or_else(|| Error::configuration(["provider.api_key (OPENAI_API_KEY)"]))?;
            Ok(ProviderConfig::OpenAiCompatible { base_url: base_url.to_string(), api_key: ApiKey::new(key) })
        }
        ProviderKind::Anthropic => {
            let key = api_key.ok_or_else(|| Error::configuration(["provider.api_key (ANTHROPIC_API_KEY)"]))?;
            Ok(ProviderConfig::Anthropic { base_url: base_url.to_string(), api_key: ApiKey::new(key) })
        }
        ProviderKind::Local => Ok(ProviderConfig::Local { base_url: base_url.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes every test that touches process-global environment
    // variables so they don't race each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_provider_envs() {
        for var in ["OPENAI_API_KEY", "ANTHROPIC_API_KEY", "OLLAMA_BASE_URL", "OPENAI_BASE_URL", "ANTHROPIC_BASE_URL"] {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    fn missing_file_loads_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_provider_envs();
        let config = AppConfig::load_from("/nonexistent/path/does-not-exist.toml").unwrap();
        assert_eq!(config.provider.provider, ProviderKind::OpenAi);
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn round_trips_through_toml_without_leaking_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_provider_envs();
        let dir = std::env::temp_dir().join(format!("vellum-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut config = AppConfig::default();
        config.provider.model = "gpt-4o".to_string();
        config.provider.api_key = Some("sk-should-not-be-saved".to_string());
        config.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("sk-should-not-be-saved"));

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.provider.model, "gpt-4o");
        assert!(reloaded.provider.api_key.is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn api_key_is_read_from_environment_for_the_selected_provider() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_provider_envs();
        unsafe { env::set_var("OPENAI_API_KEY", "sk-test-123") };
        let config = AppConfig::load_from("/nonexistent/path/does-not-exist.toml").unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test-123"));
        clear_provider_envs();
    }

    #[test]
    fn provider_config_fails_without_an_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_provider_envs();
        let config = AppConfig::load_from("/nonexistent/path/does-not-exist.toml").unwrap();
        let err = config.provider_config().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn local_provider_needs_no_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_provider_envs();
        let mut config = AppConfig::default();
        config.provider.provider = ProviderKind::Local;
        config.provider.base_url = "http://localhost:11434".to_string();
        let provider_config = config.provider_config().unwrap();
        assert!(matches!(provider_config, ProviderConfig::Local { .. }));
    }

    #[test]
    fn ollama_base_url_env_override_applies_only_to_local_provider() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_provider_envs();
        unsafe { env::set_var("OLLAMA_BASE_URL", "http://example:11434") };
        let config = AppConfig::load_from("/nonexistent/path/does-not-exist.toml").unwrap();
        // default provider is OpenAi, so the Local-only override must not apply.
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        clear_provider_envs();
    }

    #[test]
    fn embedding_provider_config_can_name_a_different_upstream_than_completion() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_provider_envs();
        unsafe { env::set_var("ANTHROPIC_API_KEY", "sk-ant-test") };
        let mut config = AppConfig::default();
        config.embedding.embedding_provider = ProviderKind::Anthropic;
        config.embedding.embedding_base_url = Some("https://api.anthropic.com".to_string());
        let reloaded_key = env_non_empty("ANTHROPIC_API_KEY");
        config.embedding.embedding_api_key = reloaded_key;

        let provider_config = config.embedding_provider_config().unwrap();
        assert!(matches!(provider_config, ProviderConfig::Anthropic { .. }));
        clear_provider_envs();
    }
}
