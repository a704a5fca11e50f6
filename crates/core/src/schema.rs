//! Declarative JSON-Schema-like description of tool parameters (spec §3,
//! §4.1, §9). Rust has no host-language reflection to derive this from a
//! struct definition the way the source framework does, so callers build a
//! [`Schema`] with the combinator functions at the bottom of this module
//! (`object()`, `string()`, …) the way the spec's design notes ask for.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// A single named property of an [`Schema::Object`], carrying its own
/// nested schema and whether it is required.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// Tagged variant describing a tool parameter or parameter tree (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String {
        description: String,
        min_length: Option<u64>,
        max_length: Option<u64>,
        enum_values: Option<Vec<String>>,
    },
    Integer {
        description: String,
        minimum: Option<i64>,
        maximum: Option<i64>,
        exclusive: bool,
        multiple_of: Option<i64>,
    },
    Number {
        description: String,
        minimum: Option<f64>,
        maximum: Option<f64>,
        exclusive: bool,
        multiple_of: Option<f64>,
    },
    Boolean {
        description: String,
    },
    Array {
        description: String,
        items: Box<Schema>,
        min_items: Option<u64>,
        max_items: Option<u64>,
        unique_items: bool,
    },
    Object {
        description: String,
        properties: Vec<ObjectProperty>,
        additional_properties: bool,
    },
    Nullable {
        description: String,
        inner: Box<Schema>,
    },
}

impl Schema {
    pub fn description(&self) -> &str {
        match self {
            Schema::String { description, .. }
            | Schema::Integer { description, .. }
            | Schema::Number { description, .. }
            | Schema::Boolean { description }
            | Schema::Array { description, .. }
            | Schema::Object { description, .. }
            | Schema::Nullable { description, .. } => description,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        match &mut self {
            Schema::String { description: d, .. }
            | Schema::Integer { description: d, .. }
            | Schema::Number { description: d, .. }
            | Schema::Boolean { description: d }
            | Schema::Array { description: d, .. }
            | Schema::Object { description: d, .. }
            | Schema::Nullable { description: d, .. } => *d = description,
        }
        self
    }

    /// Required properties for an `Object` schema; empty for every other
    /// variant. Used by the Tool Registry's null-argument law (spec §4.1,
    /// §8 invariant 5).
    pub fn required_properties(&self) -> Vec<&str> {
        match self {
            Schema::Object { properties, .. } => properties
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Schema::Object { .. })
    }

    /// Render this schema as JSON-Schema (spec §3, §6). `strict` promotes
    /// every `Object` property (recursively) to required, matching the
    /// "strict" tool-calling mode several providers support.
    pub fn to_json_schema(&self, strict: bool) -> Value {
        let mut obj = self.to_json_schema_inner(strict);
        if !self.description().is_empty() {
            obj.insert("description".into(), json!(self.description()));
        }
        Value::Object(obj)
    }

    fn to_json_schema_inner(&self, strict: bool) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            Schema::String { min_length, max_length, enum_values, .. } => {
                map.insert("type".into(), json!("string"));
                if let Some(v) = min_length {
                    map.insert("minLength".into(), json!(v));
                }
                if let Some(v) = max_length {
                    map.insert("maxLength".into(), json!(v));
                }
                if let Some(values) = enum_values {
                    map.insert("enum".into(), json!(values));
                }
            }
            Schema::Integer { minimum, maximum, exclusive, multiple_of, .. } => {
                map.insert("type".into(), json!("integer"));
                insert_bound(&mut map, "minimum", "exclusiveMinimum", *minimum, *exclusive);
                insert_bound(&mut map, "maximum", "exclusiveMaximum", *maximum, *exclusive);
                if let Some(v) = multiple_of {
                    map.insert("multipleOf".into(), json!(v));
                }
            }
            Schema::Number { minimum, maximum, exclusive, multiple_of, .. } => {
                map.insert("type".into(), json!("number"));
                insert_bound(&mut map, "minimum", "exclusiveMinimum", *minimum, *exclusive);
                insert_bound(&mut map, "maximum", "exclusiveMaximum", *maximum, *exclusive);
                if let Some(v) = multiple_of {
                    map.insert("multipleOf".into(), json!(v));
                }
            }
            Schema::Boolean { .. } => {
                map.insert("type".into(), json!("boolean"));
            }
            Schema::Array { items, min_items, max_items, unique_items, .. } => {
                map.insert("type".into(), json!("array"));
                map.insert("items".into(), items.to_json_schema(strict));
                if let Some(v) = min_items {
                    map.insert("minItems".into(), json!(v));
                }
                if let Some(v) = max_items {
                    map.insert("maxItems".into(), json!(v));
                }
                if *unique_items {
                    map.insert("uniqueItems".into(), json!(true));
                }
            }
            Schema::Object { properties, additional_properties, .. } => {
                map.insert("type".into(), json!("object"));
                let mut props = Map::new();
                let mut required: Vec<&str> = Vec::new();
                for p in properties {
                    props.insert(p.name.clone(), p.schema.to_json_schema(strict));
                    if p.required || strict {
                        required.push(&p.name);
                    }
                }
                map.insert("properties".into(), Value::Object(props));
                map.insert("required".into(), json!(required));
                map.insert("additionalProperties".into(), json!(*additional_properties));
            }
            Schema::Nullable { inner, .. } => {
                let mut inner_map = inner.to_json_schema_inner(strict);
                let merged_type = match inner_map.remove("type") {
                    Some(Value::String(t)) => json!([t, "null"]),
                    Some(Value::Array(mut arr)) => {
                        arr.push(json!("null"));
                        Value::Array(arr)
                    }
                    _ => json!(["null"]),
                };
                map = inner_map;
                map.insert("type".into(), merged_type);
            }
        }
        map
    }

    /// Parse a rendered JSON-Schema value back into a [`Schema]. Used to
    /// verify the round-trip law in spec §8 invariant 4. Unknown or
    /// unsupported shapes fail with [`Error::Corrupt`].
    pub fn from_json_schema(value: &Value) -> Result<Schema> {
        let obj = value.as_object().ok_or_else(|| Error::Corrupt {
            reason: "schema is not a JSON object".into(),
        })?;
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();

        let type_value = obj.get("type").ok_or_else(|| Error::Corrupt {
            reason: "schema missing 'type'".into(),
        })?;

        if let Some(types) = type_value.as_array() {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            if names.len() == 2 && names.contains(&"null") {
                let other = names.iter().find(|t| **t != "null").copied().unwrap_or("string");
                let mut inner_obj = obj.clone();
                inner_obj.insert("type".into(), json!(other));
                inner_obj.remove("description");
                let inner = Schema::from_json_schema(&Value::Object(inner_obj))?;
                return Ok(Schema::Nullable {
                    description,
                    inner: Box::new(inner),
                });
            }
            return Err(Error::Corrupt {
                reason: format!("unsupported union type: {names:?}"),
            });
        }

        let type_name = type_value.as_str().ok_or_else(|| Error::Corrupt {
            reason: "'type' is neither a string nor a [T, null] array".into(),
        })?;

        Ok(match type_name {
            "string" => Schema::String {
                description,
                min_length: obj.get("minLength").and_then(Value::as_u64),
                max_length: obj.get("maxLength").and_then(Value::as_u64),
                enum_values: obj.get("enum").and_then(Value::as_array).map(|a| {
                    a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
                }),
            },
            "integer" => Schema::Integer {
                description,
                minimum: obj.get("minimum").and_then(Value::as_i64),
                maximum: obj.get("maximum").and_then(Value::as_i64),
                exclusive: obj.contains_key("exclusiveMinimum") || obj.contains_key("exclusiveMaximum"),
                multiple_of: obj.get("multipleOf").and_then(Value::as_i64),
            },
            "number" => Schema::Number {
                description,
                minimum: obj.get("minimum").and_then(Value::as_f64),
                maximum: obj.get("maximum").and_then(Value::as_f64),
                exclusive: obj.contains_key("exclusiveMinimum") || obj.contains_key("exclusiveMaximum"),
                multiple_of: obj.get("multipleOf").and_then(Value::as_f64),
            },
            "boolean" => Schema::Boolean { description },
            "array" => {
                let items_value = obj.get("items").ok_or_else(|| Error::Corrupt {
                    reason: "array schema missing 'items'".into(),
                })?;
                Schema::Array {
                    description,
                    items: Box::new(Schema::from_json_schema(items_value)?),
                    min_items: obj.get("minItems").and_then(Value::as_u64),
                    max_items: obj.get("maxItems").and_then(Value::as_u64),
                    unique_items: obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false),
                }
            }
            "object" => {
                let required: Vec<&str> = obj
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let props_obj = obj.get("properties").and_then(Value::as_object);
                let mut properties = Vec::new();
                if let Some(props_obj) = props_obj {
                    for (name, schema_value) in props_obj {
                        properties.push(ObjectProperty {
                            name: name.clone(),
                            schema: Schema::from_json_schema(schema_value)?,
                            required: required.contains(&name.as_str()),
                        });
                    }
                }
                Schema::Object {
                    description,
                    properties,
                    additional_properties: obj
                        .get("additionalProperties")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                }
            }
            other => {
                return Err(Error::Corrupt {
                    reason: format!("unsupported schema type: {other}"),
                })
            }
        })
    }
}

fn insert_bound<T: serde::Serialize>(
    map: &mut Map<String, Value>,
    inclusive_key: &str,
    exclusive_key: &str,
    bound: Option<T>,
    exclusive: bool,
) {
    if let Some(v) = bound {
        let key = if exclusive { exclusive_key } else { inclusive_key };
        map.insert(key.into(), json!(v));
    }
}

// ── Combinator builders ──────────────────────────────────────────────────────

pub fn string() -> Schema {
    Schema::String {
        description: String::new(),
        min_length: None,
        max_length: None,
        enum_values: None,
    }
}

pub fn integer() -> Schema {
    Schema::Integer {
        description: String::new(),
        minimum: None,
        maximum: None,
        exclusive: false,
        multiple_of: None,
    }
}

pub fn number() -> Schema {
    Schema::Number {
        description: String::new(),
        minimum: None,
        maximum: None,
        exclusive: false,
        multiple_of: None,
    }
}

pub fn boolean() -> Schema {
    Schema::Boolean { description: String::new() }
}

pub fn array(items: Schema) -> Schema {
    Schema::Array {
        description: String::new(),
        items: Box::new(items),
        min_items: None,
        max_items: None,
        unique_items: false,
    }
}

pub fn object() -> Schema {
    Schema::Object {
        description: String::new(),
        properties: Vec::new(),
        additional_properties: false,
    }
}

pub fn nullable(inner: Schema) -> Schema {
    Schema::Nullable {
        description: String::new(),
        inner: Box::new(inner),
    }
}

impl Schema {
    pub fn with_enum(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        if let Schema::String { enum_values, .. } = &mut self {
            *enum_values = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn with_min_length(mut self, min: u64) -> Self {
        if let Schema::String { min_length, .. } = &mut self {
            *min_length = Some(min);
        }
        self
    }

    pub fn with_max_length(mut self, max: u64) -> Self {
        if let Schema::String { max_length, .. } = &mut self {
            *max_length = Some(max);
        }
        self
    }

    pub fn with_range_i64(mut self, min: i64, max: i64) -> Self {
        if let Schema::Integer { minimum, maximum, .. } = &mut self {
            *minimum = Some(min);
            *maximum = Some(max);
        }
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: Schema, required: bool) -> Self {
        if let Schema::Object { properties, .. } = &mut self {
            properties.push(ObjectProperty {
                name: name.into(),
                schema,
                required,
            });
        }
        self
    }

    pub fn with_additional_properties(mut self, allowed: bool) -> Self {
        if let Schema::Object { additional_properties, .. } = &mut self {
            *additional_properties = allowed;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_primitive_string() {
        let s = string().with_description("a city name").with_min_length(1);
        let rendered = s.to_json_schema(false);
        let parsed = Schema::from_json_schema(&rendered).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn round_trip_object_with_nested_array_and_nullable() {
        let s = object()
            .with_description("weather request")
            .with_property("city", string().with_description("city"), true)
            .with_property(
                "tags",
                array(string().with_description("tag")).with_description("tags"),
                false,
            )
            .with_property(
                "limit",
                nullable(integer().with_description("cap")).with_description("optional cap"),
                false,
            );
        let rendered = s.to_json_schema(false);
        let parsed = Schema::from_json_schema(&rendered).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn strict_mode_promotes_all_properties_required() {
        let s = object()
            .with_property("a", string(), true)
            .with_property("b", string(), false);
        let rendered = s.to_json_schema(true);
        let required = rendered["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
    }

    #[test]
    fn nullable_renders_type_array_with_null() {
        let s = nullable(string());
        let rendered = s.to_json_schema(false);
        let ty = rendered["type"].as_array().unwrap();
        assert!(ty.iter().any(|v| v == "null"));
        assert!(ty.iter().any(|v| v == "string"));
    }

    #[test]
    fn required_properties_empty_for_non_object() {
        assert!(string().required_properties().is_empty());
    }

    #[test]
    fn required_properties_lists_only_required_fields() {
        let s = object()
            .with_property("a", string(), true)
            .with_property("b", string(), false);
        assert_eq!(s.required_properties(), vec!["a"]);
    }

    #[test]
    fn object_with_no_required_properties_has_empty_list() {
        let s = object().with_property("a", string(), false);
        assert!(s.required_properties().is_empty());
    }
}
