//! Dotted-path typed accessors over tool call arguments, so a `Tool` impl
//! can write `get_string(&args, "location.city")?` instead of chaining
//! `serde_json::Value::get`/`as_str` calls by hand. Every failure reports
//! the dotted path it failed at, not just the top-level field name.

use serde_json::Value;
use vellum_core::{Error, Result, ToolCallError};

fn navigate<'a>(value: &'a Value, tool: &str, path: &str) -> Result<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match (current, segment.parse::<usize>()) {
            (Value::Object(map), _) => map.get(segment).ok_or_else(|| invalid(tool, path, "present field", "missing"))?,
            (Value::Array(items), Ok(index)) => items
                .get(index)
                .ok_or_else(|| invalid(tool, path, "in-bounds index", "out of bounds"))?,
            _ => return Err(invalid(tool, path, "object or array", type_name(current))),
        };
    }
    Ok(current)
}

fn invalid(tool: &str, path: &str, expected: &str, found: &str) -> Error {
    ToolCallError::InvalidArguments {
        tool: tool.to_string(),
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
    .into()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn get_string(value: &Value, tool: &str, path: &str) -> Result<String> {
    navigate(value, tool, path)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(tool, path, "string", type_name(navigate(value, tool, path).unwrap())))
}

pub fn get_i64(value: &Value, tool: &str, path: &str) -> Result<i64> {
    navigate(value, tool, path)?
        .as_i64()
        .ok_or_else(|| invalid(tool, path, "integer", type_name(navigate(value, tool, path).unwrap())))
}

pub fn get_f64(value: &Value, tool: &str, path: &str) -> Result<f64> {
    navigate(value, tool, path)?
        .as_f64()
        .ok_or_else(|| invalid(tool, path, "number", type_name(navigate(value, tool, path).unwrap())))
}

pub fn get_bool(value: &Value, tool: &str, path: &str) -> Result<bool> {
    navigate(value, tool, path)?
        .as_bool()
        .ok_or_else(|| invalid(tool, path, "boolean", type_name(navigate(value, tool, path).unwrap())))
}

pub fn get_array<'a>(value: &'a Value, tool: &str, path: &str) -> Result<&'a Vec<Value>> {
    navigate(value, tool, path)?
        .as_array()
        .ok_or_else(|| invalid(tool, path, "array", type_name(navigate(value, tool, path).unwrap())))
}

pub fn get_object<'a>(
    value: &'a Value,
    tool: &str,
    path: &str,
) -> Result<&'a serde_json::Map<String, Value>> {
    navigate(value, tool, path)?
        .as_object()
        .ok_or_else(|| invalid(tool, path, "object", type_name(navigate(value, tool, path).unwrap())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn navigates_nested_object_path() {
        let args = json!({"location": {"city": "Lyon"}});
        assert_eq!(get_string(&args, "t", "location.city").unwrap(), "Lyon");
    }

    #[test]
    fn navigates_array_index_segment() {
        let args = json!({"items": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(get_string(&args, "t", "items.1.name").unwrap(), "b");
    }

    #[test]
    fn missing_field_reports_full_path() {
        let args = json!({"location": {}});
        let err = get_string(&args, "weather", "location.city").unwrap_err();
        match err {
            Error::ToolCall(ToolCallError::InvalidArguments { path, tool, .. }) => {
                assert_eq!(path, "location.city");
                assert_eq!(tool, "weather");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn wrong_type_reports_expected_and_found() {
        let args = json!({"count": "not a number"});
        let err = get_i64(&args, "t", "count").unwrap_err();
        match err {
            Error::ToolCall(ToolCallError::InvalidArguments { expected, found, .. }) => {
                assert_eq!(expected, "integer");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
