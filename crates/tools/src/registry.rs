//! The Tool Registry (spec §4.1): a name-keyed collection of [`Tool`]
//! handlers, argument normalization/validation against each tool's
//! [`Schema`], and sequential/bounded-parallel batch invocation.
//!
//! Grounded on `aigent_tools::{Tool, ToolRegistry}` (the `#[async_trait]`
//! handler trait and `Vec<Box<dyn Tool>>` storage) and
//! `aigent_runtime::tool_loop::execute_tool_calls` (parallel execution that
//! preserves call order by zipping the original call list against indexed
//! results rather than trusting completion order).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;
use vellum_core::{Error, Result, Schema, ToolCallError, ToolDeclaration};

/// Static description of a tool: name, human-readable description, and the
/// [`Schema`] its arguments must satisfy. Distinct from
/// [`vellum_core::ToolDeclaration`] only in that it travels alongside the
/// handler, not just the wire-facing shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Schema,
}

impl From<&ToolDescriptor> for ToolDeclaration {
    fn from(d: &ToolDescriptor) -> Self {
        ToolDeclaration {
            name: d.name.clone(),
            description: d.description.clone(),
            parameters: d.parameters.clone(),
        }
    }
}

/// A single callable tool. Implementations are expected to be cheap to
/// hold behind `Arc` and safe to invoke concurrently.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute with already-normalized, schema-validated arguments.
    async fn invoke(&self, arguments: Value) -> Result<Value>;
}

/// Normalizes a raw (possibly absent) argument payload against `schema`
/// before it reaches a [`Tool::invoke`] call.
///
/// Decided Open Question (see DESIGN.md): `null` arguments are accepted
/// only when the schema is an `Object` with zero required properties — in
/// every other case a tool has implicit required parameters and `null`
/// always fails with `NullArguments`.
pub fn normalize_arguments(tool: &str, schema: &Schema, arguments: Option<Value>) -> Result<Value> {
    match arguments {
        None | Some(Value::Null) => {
            if schema.is_object() && schema.required_properties().is_empty() {
                Ok(Value::Object(Default::default()))
            } else {
                Err(ToolCallError::NullArguments { tool: tool.to_string() }.into())
            }
        }
        Some(value) => {
            validate_value(tool, schema, &value, "")?;
            Ok(value)
        }
    }
}

fn invalid(tool: &str, path: &str, expected: impl Into<String>, found: impl Into<String>) -> Error {
    ToolCallError::InvalidArguments {
        tool: tool.to_string(),
        path: path.to_string(),
        expected: expected.into(),
        found: found.into(),
    }
    .into()
}

fn join_path(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

/// Recursively validates `value` against `schema` (spec §4.1 step 3:
/// "validate types, enums, ranges, required fields"), walking every
/// `Schema` variant — nested object properties, array items, and the
/// `Nullable` wrapper — and failing with `InvalidArguments{path, expected,
/// found}` at the first mismatch.
fn validate_value(tool: &str, schema: &Schema, value: &Value, path: &str) -> Result<()> {
    match schema {
        Schema::Nullable { inner, .. } => {
            if value.is_null() {
                Ok(())
            } else {
                validate_value(tool, inner, value, path)
            }
        }
        Schema::String { min_length, max_length, enum_values, .. } => {
            let Some(s) = value.as_str() else {
                return Err(invalid(tool, path, "string", json_type_name(value)));
            };
            let len = s.chars().count() as u64;
            if let Some(min) = min_length {
                if len < *min {
                    return Err(invalid(tool, path, format!("length >= {min}"), format!("length {len}")));
                }
            }
            if let Some(max) = max_length {
                if len > *max {
                    return Err(invalid(tool, path, format!("length <= {max}"), format!("length {len}")));
                }
            }
            if let Some(values) = enum_values {
                if !values.iter().any(|v| v == s) {
                    return Err(invalid(tool, path, format!("one of {values:?}"), format!("{s:?}")));
                }
            }
            Ok(())
        }
        Schema::Integer { minimum, maximum, exclusive, multiple_of, .. } => {
            let n = value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64));
            let Some(n) = n else {
                return Err(invalid(tool, path, "integer", json_type_name(value)));
            };
            if let Some(min) = minimum {
                let ok = if *exclusive { n > *min } else { n >= *min };
                if !ok {
                    return Err(invalid(tool, path, format!(">= {min}"), format!("{n}")));
                }
            }
            if let Some(max) = maximum {
                let ok = if *exclusive { n < *max } else { n <= *max };
                if !ok {
                    return Err(invalid(tool, path, format!("<= {max}"), format!("{n}")));
                }
            }
            if let Some(m) = multiple_of {
                if *m != 0 && n % m != 0 {
                    return Err(invalid(tool, path, format!("multiple of {m}"), format!("{n}")));
                }
            }
            Ok(())
        }
        Schema::Number { minimum, maximum, exclusive, multiple_of, .. } => {
            let Some(n) = value.as_f64() else {
                return Err(invalid(tool, path, "number", json_type_name(value)));
            };
            if let Some(min) = minimum {
                let ok = if *exclusive { n > *min } else { n >= *min };
                if !ok {
                    return Err(invalid(tool, path, format!(">= {min}"), format!("{n}")));
                }
            }
            if let Some(max) = maximum {
                let ok = if *exclusive { n < *max } else { n <= *max };
                if !ok {
                    return Err(invalid(tool, path, format!("<= {max}"), format!("{n}")));
                }
            }
            if let Some(m) = multiple_of {
                if *m != 0.0 {
                    let quotient = n / m;
                    if (quotient - quotient.round()).abs() > 1e-9 {
                        return Err(invalid(tool, path, format!("multiple of {m}"), format!("{n}")));
                    }
                }
            }
            Ok(())
        }
        Schema::Boolean { .. } => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(invalid(tool, path, "boolean", json_type_name(value)))
            }
        }
        Schema::Array { items, min_items, max_items, unique_items, .. } => {
            let Some(arr) = value.as_array() else {
                return Err(invalid(tool, path, "array", json_type_name(value)));
            };
            let len = arr.len() as u64;
            if let Some(min) = min_items {
                if len < *min {
                    return Err(invalid(tool, path, format!("length >= {min}"), format!("length {len}")));
                }
            }
            if let Some(max) = max_items {
                if len > *max {
                    return Err(invalid(tool, path, format!("length <= {max}"), format!("length {len}")));
                }
            }
            if *unique_items {
                for (i, a) in arr.iter().enumerate() {
                    if arr[..i].iter().any(|b| b == a) {
                        return Err(invalid(tool, path, "unique items", "duplicate item"));
                    }
                }
            }
            for (i, item) in arr.iter().enumerate() {
                validate_value(tool, items, item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        Schema::Object { properties, .. } => {
            let Some(obj) = value.as_object() else {
                return Err(invalid(tool, path, "object", json_type_name(value)));
            };
            for property in properties {
                match obj.get(&property.name) {
                    Some(field_value) => {
                        validate_value(tool, &property.schema, field_value, &join_path(path, &property.name))?;
                    }
                    None if property.required => {
                        return Err(invalid(tool, &join_path(path, &property.name), "present field", "missing"));
                    }
                    None => {}
                }
            }
            Ok(())
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One tool call as submitted to [`ToolRegistry::invoke_batch`]: an id used
/// only to correlate the result back to the caller, the tool name, and raw
/// (unnormalized) arguments.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub id: String,
    pub name: String,
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub id: String,
    pub result: std::result::Result<Value, Error>,
}

/// How a batch of tool calls should be executed.
#[derive(Debug, Clone, Copy)]
pub enum InvocationStrategy {
    Sequential,
    Parallel { max_concurrency: usize },
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Registers `tool`, rejecting a name collision rather than silently
    /// shadowing — unlike the teacher's linear registry, which kept
    /// duplicates and resolved lookups first-match-wins.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<()> {
        let name = tool.descriptor().name;
        if self.tools.contains_key(&name) {
            return Err(ToolCallError::DuplicateToolName { name }.into());
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Renders every registered tool's declaration for inclusion in a
    /// `CompletionOptions`.
    pub fn definitions(&self) -> Vec<ToolDeclaration> {
        self.tools.values().map(|t| ToolDeclaration::from(&t.descriptor())).collect()
    }

    pub async fn invoke(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolCallError::UnknownTool { name: name.to_string() })?;
        let normalized = normalize_arguments(name, &tool.descriptor().parameters, arguments)?;
        tool.invoke(normalized).await.map_err(|e| {
            ToolCallError::HandlerError {
                tool: name.to_string(),
                cause: e.to_string(),
            }
            .into()
        })
    }

    /// Invokes every call in `calls`, returning one [`CallOutcome`] per
    /// call in the same order they were submitted — regardless of which
    /// strategy runs them or which finishes first.
    pub async fn invoke_batch(&self, calls: Vec<PendingCall>, strategy: InvocationStrategy) -> Vec<CallOutcome> {
        match strategy {
            InvocationStrategy::Sequential => {
                let mut outcomes = Vec::with_capacity(calls.len());
                for call in calls {
                    let result = self.invoke(&call.name, call.arguments).await;
                    outcomes.push(CallOutcome { id: call.id, result });
                }
                outcomes
            }
            InvocationStrategy::Parallel { max_concurrency } => {
                let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
                let futures = calls.into_iter().map(|call| {
                    let semaphore = Arc::clone(&semaphore);
                    async move {
                        let _permit = semaphore.acquire().await.expect("semaphore never closed");
                        let result = self.invoke(&call.name, call.arguments).await;
                        CallOutcome { id: call.id, result }
                    }
                });
                futures::future::join_all(futures).await
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vellum_core::{integer, object, string};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "echo".into(),
                description: "echoes its input".into(),
                parameters: object().with_property("text", string(), true),
            }
        }

        async fn invoke(&self, arguments: Value) -> Result<Value> {
            Ok(arguments)
        }
    }

    struct NoArgs;

    #[async_trait]
    impl Tool for NoArgs {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "ping".into(),
                description: "takes no arguments".into(),
                parameters: object(),
            }
        }

        async fn invoke(&self, _arguments: Value) -> Result<Value> {
            Ok(json!("pong"))
        }
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("missing", None).await.unwrap_err();
        assert!(matches!(err, Error::ToolCall(ToolCallError::UnknownTool { .. })));
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let err = registry.register(Echo).unwrap_err();
        assert!(matches!(err, Error::ToolCall(ToolCallError::DuplicateToolName { .. })));
    }

    #[tokio::test]
    async fn null_arguments_rejected_when_schema_has_required_fields() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let err = registry.invoke("echo", None).await.unwrap_err();
        assert!(matches!(err, Error::ToolCall(ToolCallError::NullArguments { .. })));
    }

    #[tokio::test]
    async fn null_arguments_accepted_when_schema_has_no_required_fields() {
        let mut registry = ToolRegistry::new();
        registry.register(NoArgs).unwrap();
        let result = registry.invoke("ping", None).await.unwrap();
        assert_eq!(result, json!("pong"));
    }

    #[tokio::test]
    async fn missing_required_field_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let err = registry.invoke("echo", Some(json!({}))).await.unwrap_err();
        assert!(matches!(err, Error::ToolCall(ToolCallError::InvalidArguments { .. })));
    }

    struct Birthday;

    #[async_trait]
    impl Tool for Birthday {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "birthday".into(),
                description: "takes an age".into(),
                parameters: object().with_property("age", integer().with_range_i64(0, 120), true),
            }
        }

        async fn invoke(&self, arguments: Value) -> Result<Value> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn wrong_type_for_a_required_field_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Birthday).unwrap();
        let err = registry.invoke("birthday", Some(json!({"age": "old"}))).await.unwrap_err();
        assert!(matches!(err, Error::ToolCall(ToolCallError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn out_of_range_value_for_a_required_field_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Birthday).unwrap();
        let err = registry.invoke("birthday", Some(json!({"age": 999}))).await.unwrap_err();
        assert!(matches!(err, Error::ToolCall(ToolCallError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn in_range_value_accepted() {
        let mut registry = ToolRegistry::new();
        registry.register(Birthday).unwrap();
        let result = registry.invoke("birthday", Some(json!({"age": 42}))).await.unwrap();
        assert_eq!(result, json!({"age": 42}));
    }

    #[tokio::test]
    async fn invoke_batch_preserves_submission_order_when_parallel() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let calls = vec![
            PendingCall { id: "1".into(), name: "echo".into(), arguments: Some(json!({"text": "a"})) },
            PendingCall { id: "2".into(), name: "echo".into(), arguments: Some(json!({"text": "b"})) },
            PendingCall { id: "3".into(), name: "echo".into(), arguments: Some(json!({"text": "c"})) },
        ];
        let outcomes = registry
            .invoke_batch(calls, InvocationStrategy::Parallel { max_concurrency: 2 })
            .await;
        let ids: Vec<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn descriptors_and_definitions_report_all_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        registry.register(NoArgs).unwrap();
        assert_eq!(registry.descriptors().len(), 2);
        assert_eq!(registry.definitions().len(), 2);
    }
}
