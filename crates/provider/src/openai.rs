//! Adapter for OpenAI and OpenAI-compatible endpoints (OpenRouter, local
//! proxies that mirror the `/chat/completions` shape). Grounded on
//! `aigent_llm::OpenRouterClient` and its `parse_openai_chat_response`.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use vellum_core::{
    CompletionOptions, CompletionResult, Error, FinishReason, Result, ToolCall, ToolChoice, Usage,
};

use crate::provider::{ApiKey, CompletionStream, Provider, StreamEvent};
use crate::retry::with_retry;
use crate::sse::json_event_stream;
use crate::wire::{messages_to_json, tools_to_json, ToolCallAccumulator};

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenAiProvider {
    pub fn new(base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn request_body(&self, options: &CompletionOptions, stream: bool) -> Value {
        let mut body = json!({
            "model": options.model,
            "messages": messages_to_json(&options.conversation),
            "stream": stream,
        });
        let map = body.as_object_mut().expect("object literal");
        if stream {
            map.insert("stream_options".into(), json!({ "include_usage": true }));
        }
        if !options.tools.is_empty() {
            map.insert("tools".into(), json!(tools_to_json(&options.tools, options.strict_schema)));
            map.insert(
                "tool_choice".into(),
                match &options.tool_choice {
                    ToolChoice::Auto => json!("auto"),
                    ToolChoice::None => json!("none"),
                    ToolChoice::Required => json!("required"),
                    ToolChoice::Named(name) => json!({
                        "type": "function",
                        "function": { "name": name },
                    }),
                },
            );
        }
        if let Some(t) = options.temperature {
            map.insert("temperature".into(), json!(t));
        }
        if let Some(m) = options.max_tokens {
            map.insert("max_tokens".into(), json!(m));
        }
        body
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.api_key.expose())
            .header("content-type", "application/json")
    }
}

fn finish_reason_from_str(s: &str) -> FinishReason {
    match s {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Error,
    }
}

fn parse_completion_response(body: &Value) -> Result<CompletionResult> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| Error::StreamProtocol { reason: "response has no choices".into() })?;
    let message = choice.get("message").ok_or_else(|| Error::StreamProtocol {
        reason: "choice has no message".into(),
    })?;
    let content = message.get("content").and_then(Value::as_str).map(str::to_string);
    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?.to_string();
                    let function = tc.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments_str = function.get("arguments")?.as_str()?;
                    let arguments = serde_json::from_str(arguments_str).unwrap_or(Value::Null);
                    Some(ToolCall::new(id, name, arguments))
                })
                .collect()
        })
        .unwrap_or_default();
    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .map(finish_reason_from_str)
        .unwrap_or(FinishReason::Stop);
    let usage = body
        .get("usage")
        .map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
            completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
            total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0),
            estimated: false,
        })
        .unwrap_or_default();
    Ok(CompletionResult { content, tool_calls, finish_reason, usage })
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, options: CompletionOptions) -> Result<CompletionResult> {
        with_retry(|| async {
            let body = self.request_body(&options, false);
            let response = self
                .post("/chat/completions")
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
            .post("/chat/completions")
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
        Ok(Box::pin(fold_openai_stream(events)))
    }

    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let response = self
            .post("/embeddings")
            .json(&json!({ "model": "text-embedding-3-small", "input": input }))
            .send()
            .await
            .map_err(|e| Error::Network { cause: e.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Service { status: status.as_u16(), body: text });
        }
        let value: Value = response.json().await.map_err(|e| Error::StreamProtocol { reason: e.to_string() })?;
        let data = value.get("data").and_then(Value::as_array).ok_or_else(|| Error::StreamProtocol {
            reason: "embeddings response has no data".into(),
        })?;
        data.iter()
            .map(|item| {
                item.get("embedding")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(Value::as_f64).map(|f| f as f32).collect())
                    .ok_or_else(|| Error::StreamProtocol { reason: "embedding entry malformed".into() })
            })
            .collect()
    }
}

/// Folds raw SSE JSON chunks into the ordered `StreamEvent` sequence the
/// `Provider::stream` contract promises: text deltas as they arrive, then
/// one `ToolCallComplete` per accumulated index, then `Finish`. Runs on a
/// spawned task reading from `events` so the returned stream only ever
/// produces events in that order, regardless of how the caller polls it.
fn fold_openai_stream(
    mut events: impl futures::Stream<Item = Result<Value>> + Send + Unpin + 'static,
) -> tokio_stream::wrappers::ReceiverStream<Result<StreamEvent>> {
    let (tx, rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(async move {
        let mut accumulator = ToolCallAccumulator::default();
        let mut finish_reason = None;
        let mut usage = None;
        let mut completion_chars = 0u64;
        while let Some(next) = events.next().await {
            let chunk_value = match next {
                Ok(v) => v,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if let Some(u) = chunk_value.get("usage") {
                usage = Some(Usage {
                    prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
                    completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
                    total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0),
                    estimated: false,
                });
            }
            let choice = chunk_value.get("choices").and_then(|c| c.get(0));
            let delta = choice.and_then(|c| c.get("delta"));
            if let Some(reason) = choice.and_then(|c| c.get("finish_reason")).and_then(Value::as_str) {
                finish_reason = Some(finish_reason_from_str(reason));
            }
            if let Some(content) = delta.and_then(|d| d.get("content")).and_then(Value::as_str) {
                if !content.is_empty() {
                    completion_chars += content.len() as u64;
                    if tx.send(Ok(StreamEvent::TextDelta(content.to_string()))).await.is_err() {
                        return;
                    }
                }
            }
            if let Some(calls) = delta.and_then(|d| d.get("tool_calls")).and_then(Value::as_array) {
                for call in calls {
                    let index = call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                    let id = call.get("id").and_then(Value::as_str);
                    let function = call.get("function");
                    let name = function.and_then(|f| f.get("name")).and_then(Value::as_str);
                    let args_fragment = function.and_then(|f| f.get("arguments")).and_then(Value::as_str).unwrap_or("");
                    accumulator.absorb(index, id, name, args_fragment);
                }
            }
        }
        for tool_call in accumulator.into_tool_calls() {
            if tx.send(Ok(StreamEvent::ToolCallComplete(tool_call))).await.is_err() {
                return;
            }
        }
        let usage = usage.unwrap_or_else(|| Usage::estimate(0, completion_chars / 4));
        if tx.send(Ok(StreamEvent::Usage(usage))).await.is_err() {
            return;
        }
        let _ = tx.send(Ok(StreamEvent::Finish(finish_reason.unwrap_or(FinishReason::Stop)))).await;
    });
    tokio_stream::wrappers::ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_emits_usage_before_finish_when_the_server_reports_it() {
        let chunks: Vec<Result<Value>> = vec![
            Ok(json!({ "choices": [{ "delta": { "content": "hi" } }] })),
            Ok(json!({
                "choices": [],
                "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 },
            })),
        ];
        let mut stream = fold_openai_stream(futures::stream::iter(chunks));
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
        let usage_pos = events.iter().position(|e| matches!(e, StreamEvent::Usage(_))).expect("usage emitted");
        let finish_pos = events.iter().position(|e| matches!(e, StreamEvent::Finish(_))).expect("finish emitted");
        assert!(usage_pos < finish_pos);
        match &events[usage_pos] {
            StreamEvent::Usage(u) => {
                assert_eq!(u.total_tokens, 15);
                assert!(!u.estimated);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn stream_falls_back_to_an_estimated_usage_when_the_server_omits_it() {
        let chunks: Vec<Result<Value>> = vec![
            Ok(json!({ "choices": [{ "delta": { "content": "hello there" }, "finish_reason": "stop" }] })),
        ];
        let mut stream = fold_openai_stream(futures::stream::iter(chunks));
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
        let usage = events.iter().find_map(|e| match e {
            StreamEvent::Usage(u) => Some(u),
            _ => None,
        });
        assert!(usage.is_some_and(|u| u.estimated));
    }

    #[test]
    fn finish_reason_maps_tool_calls_and_function_call_the_same() {
        assert_eq!(finish_reason_from_str("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(finish_reason_from_str("function_call"), FinishReason::ToolCalls);
        assert_eq!(finish_reason_from_str("stop"), FinishReason::Stop);
    }

    #[test]
    fn parse_completion_response_extracts_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "get_weather", "arguments": "{\"city\":\"Lyon\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        let result = parse_completion_response(&body).unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "get_weather");
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
        assert_eq!(result.usage.total_tokens, 15);
    }
}
