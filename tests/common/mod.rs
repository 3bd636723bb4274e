//! Shared test helpers: scripted transport, canned tools and wiremock bodies.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use chofesh::client::{CompletionRequest, CompletionTransport};
use chofesh::config::ClientConfig;
use chofesh::error::{ChofeshError, Result};
use chofesh::tools::{FnTool, ToolParameters};
use chofesh::types::*;

/// A transport that replays queued responses and records every request.
///
/// When the queue is empty it keeps returning the fallback, if one is set.
pub struct ScriptedTransport {
    responses: Mutex<Vec<Message>>,
    fallback: Option<Message>,
    requests: Mutex<Vec<CompletionRequest>>,
    chunks: Mutex<Vec<Vec<StreamChunk>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            chunks: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request after the queue runs dry with `message`.
    pub fn repeating(message: Message) -> Self {
        Self {
            fallback: Some(message),
            ..Self::new()
        }
    }

    pub fn queue(self, message: Message) -> Self {
        self.responses.lock().unwrap().insert(0, message);
        self
    }

    pub fn queue_text(self, text: &str) -> Self {
        self.queue(Message::assistant(text).with_model("scripted"))
    }

    pub fn queue_tool_call(self, id: &str, name: &str, args: Value) -> Self {
        self.queue(tool_call_message(id, name, args))
    }

    pub fn queue_stream(self, chunks: Vec<StreamChunk>) -> Self {
        self.chunks.lock().unwrap().insert(0, chunks);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Message> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop() {
            Some(message) => Ok(message),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ChofeshError::InvalidState("script exhausted".into())),
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = self
            .chunks
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ChofeshError::InvalidState("no stream scripted".into()))?;
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

/// Assistant message requesting one tool call.
pub fn tool_call_message(id: &str, name: &str, args: Value) -> Message {
    let params = args.as_object().cloned().unwrap_or_default();
    Message::assistant("")
        .with_model("scripted")
        .with_tool_calls(vec![ToolCall::new(id, name, params)])
}

/// `echo(text)` returning `{"result": "Processed: <text>"}`.
pub fn echo_tool() -> FnTool {
    FnTool::new(
        "echo",
        "Echo the input",
        ToolParameters::object()
            .string("text", "Text to echo", true)
            .build(),
        |args| async move {
            let text = args.get_str("text")?;
            Ok(json!({ "result": format!("Processed: {text}") }))
        },
    )
}

/// A tool that always fails.
pub fn failing_tool(name: &str) -> FnTool {
    FnTool::new(name, "Always fails", ToolParameters::empty(), |_args| async {
        Err(ChofeshError::Validation("upstream unavailable".into()))
    })
}

/// A tool that counts its executions.
pub fn counting_tool(name: &str, counter: Arc<AtomicUsize>) -> FnTool {
    FnTool::new(name, "Counts calls", ToolParameters::empty(), move |_args| {
        let counter = counter.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!(n))
        }
    })
}

pub fn empty_args() -> Map<String, Value> {
    Map::new()
}

// Wiremock helpers

pub fn client_config(server_uri: &str) -> ClientConfig {
    ClientConfig::new("test-key")
        .with_base_url(server_uri)
        .with_model("gpt-oss-120b")
}

/// Non-streaming completion body with plain content.
pub fn chat_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16 }
    })
}

/// Non-streaming completion body requesting one tool call.
pub fn tool_call_body(id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": arguments }
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

/// SSE body for the given content deltas, the last carrying `finish_reason`.
pub fn sse_body(parts: &[&str]) -> String {
    let mut body = String::new();
    for (i, part) in parts.iter().enumerate() {
        let finish = if i + 1 == parts.len() { json!("stop") } else { Value::Null };
        let event = json!({ "choices": [{ "index": 0, "delta": { "content": part }, "finish_reason": finish }] });
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
