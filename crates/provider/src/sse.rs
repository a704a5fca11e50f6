//! Manual server-sent-events line parsing over `reqwest::Response::chunk`,
//! the same approach the teacher's `aigent_llm` client used instead of
//! pulling in a dedicated SSE crate. Chunks are read on a spawned task and
//! handed to the caller as a `Stream` over an mpsc channel.

use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use vellum_core::{Error, Result};

/// Turns a streaming HTTP response into a stream of parsed JSON event
/// payloads, stripping the `data: ` prefix and skipping `data: [DONE]`.
pub fn json_event_stream(mut response: reqwest::Response) -> ReceiverStream<Result<Value>> {
    let (tx, rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(async move {
        let mut buffer = String::new();
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(Error::Network { cause: e.to_string() })).await;
                    break;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline_idx) = buffer.find('\n') {
                let line = buffer[..newline_idx].trim_end_matches('\r').to_string();
                buffer.drain(..=newline_idx);
                let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                    continue;
                };
                let payload = payload.trim();
                if payload.is_empty() || payload == "[DONE]" {
                    continue;
                }
                let parsed = serde_json::from_str::<Value>(payload)
                    .map_err(|e| Error::StreamProtocol { reason: e.to_string() });
                if tx.send(parsed).await.is_err() {
                    return;
                }
            }
        }
    });
    ReceiverStream::new(rx)
}
