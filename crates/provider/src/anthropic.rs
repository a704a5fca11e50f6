//! Adapter for Anthropic's Messages API. The wire shape differs enough
//! from the OpenAI-compatible one (a top-level `system` field, content
//! blocks instead of a flat `content` string, named SSE event types) that
//! it gets its own translation, but reuses the same `json_event_stream`
//! chunk reader and retry policy.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use vellum_core::{
    CompletionOptions, CompletionResult, Error, FinishReason, Result, Role, ToolCall, ToolChoice, Usage,
};

use crate::provider::{ApiKey, CompletionStream, Provider, StreamEvent};
use crate::retry::with_retry;
use crate::sse::json_event_stream;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl AnthropicProvider {
    pub fn new(base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn request_body(&self, options: &CompletionOptions, stream: bool) -> Value {
        let mut system = None;
        let mut messages = Vec::new();
        for m in options.conversation.messages() {
            match m.role {
                Role::System => system = m.content.clone(),
                Role::User => messages.push(json!({
                    "role": "user",
                    "content": m.content.clone().unwrap_or_default(),
                })),
                Role::Assistant => {
                    let mut blocks: Vec<Value> = Vec::new();
                    if let Some(content) = &m.content {
                        blocks.push(json!({ "type": "text", "text": content }));
                    }
                    for tc in &m.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    messages.push(json!({ "role": "assistant", "content": blocks }));
                }
                Role::Tool => {
                    messages.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": m.tool_call_id,
                            "content": m.content.clone().unwrap_or_default(),
                        }],
                    }));
                }
            }
        }

        let mut body = json!({
            "model": options.model,
            "messages": messages,
            "max_tokens": options.max_tokens.unwrap_or(4096),
            "stream": stream,
        });
        let map = body.as_object_mut().expect("object literal");
        if let Some(system) = system {
            map.insert("system".into(), json!(system));
        }
        if let Some(t) = options.temperature {
            map.insert("temperature".into(), json!(t));
        }
        if !options.tools.is_empty() {
            let tools: Vec<Value> = options
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters.to_json_schema(options.strict_schema),
                    })
                })
                .collect();
            map.insert("tools".into(), json!(tools));
            map.insert(
                "tool_choice".into(),
                match &options.tool_choice {
                    ToolChoice::Auto => json!({ "type": "auto" }),
                    ToolChoice::None => json!({ "type": "none" }),
                    ToolChoice::Required => json!({ "type": "any" }),
                    ToolChoice::Named(name) => json!({ "type": "tool", "name": name }),
                },
            );
        }
        body
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
    }
}

fn stop_reason_to_finish(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Error,
    }
}

fn parse_completion_response(body: &Value) -> Result<CompletionResult> {
    let blocks = body.get("content").and_then(Value::as_array).ok_or_else(|| Error::StreamProtocol {
        reason: "response has no content blocks".into(),
    })?;
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    content.push_str(text);
                }
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let arguments = block.get("input").cloned().unwrap_or(Value::Null);
                tool_calls.push(ToolCall::new(id, name, arguments));
            }
            _ => {}
        }
    }
    let finish_reason = body
        .get("stop_reason")
        .and_then(Value::as_str)
        .map(stop_reason_to_finish)
        .unwrap_or(FinishReason::Stop);
    let usage = body
        .get("usage")
        .map(|u| {
            let prompt = u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
            let completion = u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
            Usage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: prompt + completion, estimated: false }
        })
        .unwrap_or_default();
    Ok(CompletionResult {
        content: if content.is_empty() { None } else { Some(content) },
        tool_calls,
        finish_reason,
        usage,
    })
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, options: CompletionOptions) -> Result<CompletionResult> {
        with_retry(|| async {
            let body = self.request_body(&options, false);
            let response = self
                .post("/v1/messages")
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Network { cause: e.to_string() })?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::Service { status: status.as_u16(), body: text });
            }
            let value: Value = response.json().await.map_err(|e| Error::StreamProtocol { reason: e.to_string() })?;
            parse_completion_response(&value)
        })
        .await
    }

    async fn stream(&self, options: CompletionOptions) -> Result<CompletionStream> {
        let body = self.request_body(&options, true);
        let response = self
            .post("/v1/messages")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network { cause: e.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Service { status: status.as_u16(), body: text });
        }
        let events = json_event_stream(response);
        Ok(Box::pin(fold_anthropic_stream(events)))
    }

    async fn embed(&self, _input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Err(Error::Processing {
            stage: "embed".into(),
            message: "Anthropic has no embeddings endpoint; configure an OpenAI-compatible or local provider for embeddings".into(),
        })
    }
}

fn fold_anthropic_stream(
    mut events: impl futures::Stream<Item = Result<Value>> + Send + Unpin + 'static,
) -> tokio_stream::wrappers::ReceiverStream<Result<StreamEvent>> {
    let (tx, rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(async move {
        let mut pending_tool: Option<(String, String, String)> = None;
        let mut finish_reason = None;
        while let Some(next) = events.next().await {
            let value = match next {
                Ok(v) => v,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            match value.get("type").and_then(Value::as_str) {
                Some("content_block_start") => {
                    if let Some(block) = value.get("content_block") {
                        if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                            let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                            let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                            pending_tool = Some((id, name, String::new()));
                        }
                    }
                }
                Some("content_block_delta") => {
                    if let Some(delta) = value.get("delta") {
                        match delta.get("type").and_then(Value::as_str) {
                            Some("text_delta") => {
                                if let Some(text) = delta.get("text").and_then(Value::as_str) {
                                    if tx.send(Ok(StreamEvent::TextDelta(text.to_string()))).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Some("input_json_delta") => {
                                if let (Some((_, _, args)), Some(fragment)) =
                                    (pending_tool.as_mut(), delta.get("partial_json").and_then(Value::as_str))
                                {
                                    args.push_str(fragment);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Some("content_block_stop") => {
                    if let Some((id, name, args)) = pending_tool.take() {
                        let arguments = serde_json::from_str(&args).unwrap_or(Value::Null);
                        if tx
                            .send(Ok(StreamEvent::ToolCallComplete(ToolCall::new(id, name, arguments))))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
                Some("message_delta") => {
                    if let Some(reason) = value.get("delta").and_then(|d| d.get("stop_reason")).and_then(Value::as_str) {
                        finish_reason = Some(stop_reason_to_finish(reason));
                    }
                    if let Some(usage) = value.get("usage") {
                        let completion = usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
                        let _ = tx
                            .send(Ok(StreamEvent::Usage(Usage {
                                prompt_tokens: 0,
                                completion_tokens: completion,
                                total_tokens: completion,
                                estimated: true,
                            })))
                            .await;
                    }
                }
                Some("message_stop") => {
                    let _ = tx.send(Ok(StreamEvent::Finish(finish_reason.unwrap_or(FinishReason::Stop)))).await;
                    return;
                }
                _ => {}
            }
        }
    });
    tokio_stream::wrappers::ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_tool_use_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "checking the weather" },
                { "type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Lyon"} }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 20, "output_tokens": 8 }
        });
        let result = parse_completion_response(&body).unwrap();
        assert_eq!(result.content.as_deref(), Some("checking the weather"));
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
        assert_eq!(result.usage.total_tokens, 28);
    }
}
