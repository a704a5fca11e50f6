//! Wire-shape translation shared by the OpenAI-compatible and local
//! (Ollama-style) adapters, both of which speak the same
//! `{role, content, tool_calls}` message JSON. Grounded on
//! `aigent_llm::{messages_to_openai, messages_to_ollama}`.

use serde_json::{json, Value};
use vellum_core::{Conversation, Role, ToolDeclaration};

pub fn messages_to_json(conversation: &Conversation) -> Vec<Value> {
    conversation
        .messages()
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let mut obj = json!({ "role": role });
            let map = obj.as_object_mut().expect("object literal");
            if let Some(content) = &m.content {
                map.insert("content".into(), json!(content));
            } else {
                map.insert("content".into(), Value::Null);
            }
            if !m.tool_calls.is_empty() {
                let calls: Vec<Value> = m
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": tc.arguments.to_string() },
                        })
                    })
                    .collect();
                map.insert("tool_calls".into(), json!(calls));
            }
            if let Some(id) = &m.tool_call_id {
                map.insert("tool_call_id".into(), json!(id));
            }
            if let Some(name) = &m.name {
                map.insert("name".into(), json!(name));
            }
            obj
        })
        .collect()
}

pub fn tools_to_json(tools: &[ToolDeclaration], strict: bool) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters.to_json_schema(strict),
                }
            })
        })
        .collect()
}

/// Accumulates streamed OpenAI-style `tool_calls` delta fragments, keyed
/// by the provider's stream index, the way `aigent_llm`'s client folds
/// `HashMap<usize, (id, name, args)>` across chunks: `id`/`name` are set
/// once, `arguments` fragments are concatenated.
#[derive(Default)]
pub struct ToolCallAccumulator {
    pub by_index: std::collections::BTreeMap<usize, (String, String, String)>,
}

impl ToolCallAccumulator {
    pub fn absorb(&mut self, index: usize, id: Option<&str>, name: Option<&str>, arguments_fragment: &str) {
        let entry = self.by_index.entry(index).or_insert_with(|| (String::new(), String::new(), String::new()));
        if let Some(id) = id {
            entry.0 = id.to_string();
        }
        if let Some(name) = name {
            entry.1 = name.to_string();
        }
        entry.2.push_str(arguments_fragment);
    }

    pub fn into_tool_calls(self) -> Vec<vellum_core::ToolCall> {
        self.by_index
            .into_values()
            .map(|(id, name, args)| {
                let arguments = serde_json::from_str(&args).unwrap_or(Value::Null);
                vellum_core::ToolCall::new(id, name, arguments)
            })
            .collect()
    }
}
