use thiserror::Error;

/// Specific failure within the Tool Registry's `invoke` pipeline.
///
/// Kept as its own enum (rather than flattened into [`Error`]) so registry
/// callers can match on the exact stage without a catch-all arm.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolCallError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("tool '{tool}' requires arguments but received null")]
    NullArguments { tool: String },

    #[error("invalid arguments for '{tool}' at {path}: expected {expected}, found {found}")]
    InvalidArguments {
        tool: String,
        path: String,
        expected: String,
        found: String,
    },

    #[error("tool '{tool}' handler failed: {cause}")]
    HandlerError { tool: String, cause: String },

    #[error("tool '{name}' is already registered")]
    DuplicateToolName { name: String },
}

/// The uniform, tagged error channel for every fallible operation in the
/// framework (see spec §7). Every public crate function that can fail
/// returns `Result<T, Error>`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("configuration error: missing or invalid keys: {}", .keys.join(", "))]
    Configuration { keys: Vec<String> },

    #[error("authentication failed")]
    Authentication,

    #[error("not authorized for this resource")]
    Authorization,

    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("rate limited{}", .retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("operation timed out: {op}")]
    Timeout { op: String },

    #[error("network error: {cause}")]
    Network { cause: String },

    #[error("upstream service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("stream protocol error: {reason}")]
    StreamProtocol { reason: String },

    #[error(transparent)]
    ToolCall(#[from] ToolCallError),

    #[error("guardrail rejected: {reason}")]
    Guardrail { reason: String },

    #[error("processing error in {stage}: {message}")]
    Processing { stage: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("corrupt data: {reason}")]
    Corrupt { reason: String },
}

impl Error {
    /// Whether the Provider Client's retry policy should retry this error
    /// class (spec §4.2 / §7). `Authentication`, `Validation`, and
    /// non-retryable 4xx are excluded.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::RateLimited { .. } | Error::Timeout { .. } | Error::Network { .. } => true,
            Error::Service { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Error::Configuration {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_and_timeout_are_recoverable() {
        assert!(Error::RateLimited { retry_after_secs: Some(2) }.is_recoverable());
        assert!(Error::Timeout { op: "complete".into() }.is_recoverable());
    }

    #[test]
    fn service_recoverable_only_for_408_429_5xx() {
        assert!(Error::Service { status: 408, body: String::new() }.is_recoverable());
        assert!(Error::Service { status: 429, body: String::new() }.is_recoverable());
        assert!(Error::Service { status: 503, body: String::new() }.is_recoverable());
        assert!(!Error::Service { status: 404, body: String::new() }.is_recoverable());
        assert!(!Error::Service { status: 400, body: String::new() }.is_recoverable());
    }

    #[test]
    fn auth_and_validation_are_not_recoverable() {
        assert!(!Error::Authentication.is_recoverable());
        assert!(!Error::validation("model", "must not be empty").is_recoverable());
    }

    #[test]
    fn tool_call_error_converts_into_error() {
        let err: Error = ToolCallError::UnknownTool { name: "foo".into() }.into();
        assert!(matches!(err, Error::ToolCall(ToolCallError::UnknownTool { .. })));
    }

    #[test]
    fn display_never_includes_literal_key_word_for_configuration() {
        // Error rendering must never leak secret material (spec §7); since
        // we never store api keys in Error variants this is a structural
        // guarantee, verified here by checking the common constructors.
        let err = Error::configuration(["apiKey"]);
        let rendered = err.to_string();
        assert!(rendered.contains("apiKey"), "key *name* may appear, just not its value");
    }
}
