//! Adapter for a local Ollama-style server, speaking its native
//! `/api/chat` endpoint (newline-delimited JSON, not SSE). Grounded
//! directly on `aigent_llm::OllamaClient::{chat_messages,
//! chat_messages_stream, messages_to_ollama, parse_ollama_chat_response}`.

use async_trait::async_trait;
use serde_json::{json, Value};
use vellum_core::{CompletionOptions, CompletionResult, Error, FinishReason, Result, Role, ToolCall, Usage};

use crate::provider::{CompletionStream, Provider, StreamEvent};
use crate::retry::with_retry;

pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
}

impl LocalProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn messages_to_ollama(options: &CompletionOptions) -> Vec<Value> {
        options
            .conversation
            .messages()
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                let mut msg = json!({ "role": role });
                let map = msg.as_object_mut().expect("object literal");
                if let Some(content) = &m.content {
                    map.insert("content".into(), json!(content));
                }
                if !m.tool_calls.is_empty() {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|tc| json!({ "function": { "name": tc.name, "arguments": tc.arguments } }))
                        .collect();
                    map.insert("tool_calls".into(), json!(calls));
                }
                if let Some(id) = &m.tool_call_id {
                    map.insert("tool_call_id".into(), json!(id));
                }
                msg
            })
            .collect()
    }

    fn tools_to_ollama(options: &CompletionOptions) -> Option<Value> {
        if options.tools.is_empty() {
            return None;
        }
        Some(json!(options
            .tools
            .iter()
            .map(|t| json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters.to_json_schema(options.strict_schema),
                }
            }))
            .collect::<Vec<_>>()))
    }
}

fn parse_tool_calls(calls: &[Value]) -> Vec<ToolCall> {
    calls
        .iter()
        .enumerate()
        .filter_map(|(i, call)| {
            let function = call.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let arguments = function.get("arguments").cloned().unwrap_or(json!({}));
            Some(ToolCall::new(format!("call_{i}"), name, arguments))
        })
        .collect()
}

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, options: CompletionOptions) -> Result<CompletionResult> {
        with_retry(|| async {
            let mut payload = json!({
                "model": options.model,
                "messages": Self::messages_to_ollama(&options),
                "stream": false,
            });
            if let Some(tools) = Self::tools_to_ollama(&options) {
                payload["tools"] = tools;
            }
            let response = self
                .client
                .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
                .json(&payload)
                .send()
                .await
                .map_err(|e| Error::Network { cause: e.to_string() })?;
            let status = response.status();
            let body: Value = response.json().await.map_err(|e| Error::StreamProtocol { reason: e.to_string() })?;
            if !status.is_success() {
                return Err(Error::Service { status: status.as_u16(), body: body.to_string() });
            }
            let content = body.get("message").and_then(|m| m.get("content")).and_then(Value::as_str).unwrap_or("").to_string();
            let tool_calls = body
                .get("message")
                .and_then(|m| m.get("tool_calls"))
                .and_then(Value::as_array)
                .map(|c| parse_tool_calls(c))
                .unwrap_or_default();
            let finish_reason = if tool_calls.is_empty() { FinishReason::Stop } else { FinishReason::ToolCalls };
            Ok(CompletionResult {
                content: if content.is_empty() { None } else { Some(content) },
                tool_calls,
                finish_reason,
                usage: Usage::default(),
            })
        })
        .await
    }

    async fn stream(&self, options: CompletionOptions) -> Result<CompletionStream> {
        let mut payload = json!({
            "model": options.model,
            "messages": Self::messages_to_ollama(&options),
            "stream": true,
        });
        if let Some(tools) = Self::tools_to_ollama(&options) {
            payload["tools"] = tools;
        }
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Network { cause: e.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Service { status: status.as_u16(), body: text });
        }
        Ok(Box::pin(fold_ndjson_stream(response)))
    }

    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(input.len());
        for text in input {
            let response = self
                .client
                .post(format!("{}/api/embeddings", self.base_url.trim_end_matches('/')))
                .json(&json!({ "model": "nomic-embed-text", "prompt": text }))
                .send()
                .await
                .map_err(|e| Error::Network { cause: e.to_string() })?;
            let status = response.status();
            let body: Value = response.json().await.map_err(|e| Error::StreamProtocol { reason: e.to_string() })?;
            if !status.is_success() {
                return Err(Error::Service { status: status.as_u16(), body: body.to_string() });
            }
            let embedding = body
                .get("embedding")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_f64).map(|f| f as f32).collect())
                .ok_or_else(|| Error::StreamProtocol { reason: "embedding response malformed".into() })?;
            out.push(embedding);
        }
        Ok(out)
    }
}

/// Ollama's `/api/chat` stream is newline-delimited JSON (not SSE): each
/// line is a full chat chunk, and the final line carries `"done": true`
/// plus any accumulated tool calls.
fn fold_ndjson_stream(mut response: reqwest::Response) -> tokio_stream::wrappers::ReceiverStream<Result<StreamEvent>> {
    let (tx, rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(async move {
        let mut buffer = String::new();
        let mut completion_chars = 0u64;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(c)) => c,
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(Error::Network { cause: e.to_string() })).await;
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(idx) = buffer.find('\n') {
                let line = buffer[..idx].to_string();
                buffer.drain(..=idx);
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(value) = serde_json::from_str::<Value>(&line) else { continue };
                if let Some(content) = value.get("message").and_then(|m| m.get("content")).and_then(Value::as_str) {
                    if !content.is_empty() {
                        completion_chars += content.len() as u64;
                        if tx.send(Ok(StreamEvent::TextDelta(content.to_string()))).await.is_err() {
                            return;
                        }
                    }
                }
                if value.get("done").and_then(Value::as_bool).unwrap_or(false) {
                    let tool_calls = value
                        .get("message")
                        .and_then(|m| m.get("tool_calls"))
                        .and_then(Value::as_array)
                        .map(|c| parse_tool_calls(c))
                        .unwrap_or_default();
                    let finish_reason = if tool_calls.is_empty() { FinishReason::Stop } else { FinishReason::ToolCalls };
                    for tc in tool_calls {
                        if tx.send(Ok(StreamEvent::ToolCallComplete(tc))).await.is_err() {
                            return;
                        }
                    }
                    let usage = match (
                        value.get("prompt_eval_count").and_then(Value::as_u64),
                        value.get("eval_count").and_then(Value::as_u64),
                    ) {
                        (Some(prompt), Some(completion)) => Usage {
                            prompt_tokens: prompt,
                            completion_tokens: completion,
                            total_tokens: prompt + completion,
                            estimated: false,
                        },
                        _ => Usage::estimate(0, completion_chars / 4),
                    };
                    if tx.send(Ok(StreamEvent::Usage(usage))).await.is_err() {
                        return;
                    }
                    let _ = tx.send(Ok(StreamEvent::Finish(finish_reason))).await;
                    return;
                }
            }
        }
    });
    tokio_stream::wrappers::ReceiverStream::new(rx)
}
