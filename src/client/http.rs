//! Shared HTTP helpers: headers, status mapping and SSE line decoding.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ChofeshError, Result};
use crate::types::StreamChunk;

/// Build headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| ChofeshError::Configuration("API key contains invalid header characters".into()))?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Translate a failed HTTP response into the error taxonomy.
pub fn status_to_error(status: u16, headers: &HeaderMap, body: &str) -> ChofeshError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    match status {
        401 => ChofeshError::Authentication(
            parsed
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| "Invalid API key".to_string()),
        ),
        429 => ChofeshError::RateLimited {
            retry_after_secs: retry_after_header(headers)
                .or_else(|| parsed.as_ref().and_then(retry_after_body)),
        },
        _ => {
            let message = parsed
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| body.to_string());
            ChofeshError::Api {
                status,
                message,
                body: parsed,
            }
        }
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|s| s.ceil() as u64))
}

fn retry_after_body(body: &Value) -> Option<u64> {
    body.get("error")
        .and_then(|e| e.get("retry_after"))
        .or_else(|| body.get("retry_after"))
        .and_then(Value::as_f64)
        .map(|s| s.ceil() as u64)
}

/// Pull a human-readable message out of a structured error body.
fn error_message(body: &Value) -> Option<String> {
    match body.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj.get("message").and_then(Value::as_str).map(String::from),
        _ => body.get("message").and_then(Value::as_str).map(String::from),
    }
}

/// Outcome of decoding one line of an SSE body.
#[derive(Debug, PartialEq)]
pub enum SseLine {
    /// Blank line, comment, or undecodable payload.
    Skip,
    /// The `[DONE]` terminator.
    Done,
    Chunk(StreamChunk),
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// Splits a byte stream into lines.
///
/// Bytes are held until a full line arrives, so a multibyte character split
/// across network reads is decoded intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(decode_line(&line[..end]))
    }

    /// Whatever is left after the body ends.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(line) => line.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "stream line is not valid UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Decode a single SSE line into a chunk.
pub fn decode_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    let data = line
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(line);
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let event = match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "skipping undecodable stream event");
            return SseLine::Skip;
        }
    };
    let Some(choice) = event.choices.into_iter().next() else {
        return SseLine::Skip;
    };

    let mut metadata = Map::new();
    metadata.insert(
        "finish_reason".into(),
        choice.finish_reason.clone().map(Value::String).unwrap_or(Value::Null),
    );
    SseLine::Chunk(StreamChunk {
        content: choice.delta.content.unwrap_or_default(),
        is_final: choice.finish_reason.is_some(),
        tool_call: None,
        metadata,
    })
}
