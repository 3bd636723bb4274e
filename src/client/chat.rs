//! HTTP client for `POST {base}/chat/completions`.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::http::{bearer_headers, decode_sse_line, status_to_error, SseLine, SseLineBuffer};
use super::{CompletionRequest, CompletionTransport};
use crate::blocking::{self, BlockingStream};
use crate::config::ClientConfig;
use crate::error::{ChofeshError, Result};
use crate::types::{ChunkStream, Message, Role, StreamChunk, ToolCall};

const MISSING_KEY: &str =
    "API key is required. Set CHOFESH_API_KEY or pass an explicit key in ClientConfig.";

/// Client for the chat-completions endpoint.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ChatClient {
    /// Build a client. Fails without an API key unless `defer_auth_check` is set.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.is_none() && !config.defer_auth_check {
            return Err(ChofeshError::Authentication(MISSING_KEY.into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ChofeshError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    pub(crate) fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| message_to_wire(m, self.config.include_tool_linkage))
            .collect();

        let mut body = Map::new();
        body.insert("model".into(), self.config.model.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("temperature".into(), request.temperature.into());
        body.insert("stream".into(), stream.into());

        if let Some(max) = request.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            let defs: Vec<Value> = tools.iter().map(|t| t.to_function_json()).collect();
            body.insert("tools".into(), defs.into());
        }
        for (key, value) in &request.extra {
            body.insert(key.clone(), value.clone());
        }

        Value::Object(body)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ChofeshError::Authentication(MISSING_KEY.into()))?;

        let resp = self
            .http
            .post(self.endpoint())
            .headers(bearer_headers(api_key)?)
            .json(body)
            .send()
            .await
            .map_err(|e| ChofeshError::from_http(e, self.config.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let text = resp.text().await.unwrap_or_default();
            let err = status_to_error(status.as_u16(), &headers, &text);
            if let ChofeshError::RateLimited { retry_after_secs } = &err {
                warn!(retry_after_secs = ?retry_after_secs, "rate limited by endpoint");
            }
            return Err(err);
        }
        Ok(resp)
    }

    /// Blocking variant of [`CompletionTransport::complete`].
    ///
    /// Must not be called from inside an async runtime.
    pub fn complete_blocking(&self, request: &CompletionRequest) -> Result<Message> {
        blocking::block_on(self.complete(request))?
    }

    /// Blocking variant of [`CompletionTransport::stream`], yielding chunks lazily.
    pub fn stream_blocking(&self, request: &CompletionRequest) -> Result<BlockingStream> {
        BlockingStream::open(self.stream(request))
    }
}

#[async_trait]
impl CompletionTransport for ChatClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Message> {
        let body = self.build_request_body(request, false);
        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "chat completion"
        );

        let resp = self.send(&body).await?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| ChofeshError::from_http(e, self.config.timeout))?;
        let data: ChatResponse = serde_json::from_str(&text)?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChofeshError::api(status, "No choices in completion response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, parse_arguments(tc.function.arguments)))
            .collect();

        let mut metadata = Map::new();
        metadata.insert("usage".into(), data.usage.unwrap_or_else(|| json!({})));
        metadata.insert(
            "finish_reason".into(),
            choice.finish_reason.map(Value::String).unwrap_or(Value::Null),
        );

        Ok(Message {
            metadata,
            ..Message::assistant(choice.message.content.unwrap_or_default())
                .with_model(self.config.model.clone())
                .with_tool_calls(tool_calls)
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream> {
        let body = self.build_request_body(request, true);
        debug!(model = %self.config.model, messages = request.messages.len(), "chat completion stream");

        let resp = self.send(&body).await?;
        let timeout = self.config.timeout;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::default();
            futures::pin_mut!(byte_stream);

            loop {
                let bytes = match byte_stream.next().await {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        yield Err(ChofeshError::from_http(e, timeout));
                        return;
                    }
                    None => break,
                };
                lines.push(&bytes);

                while let Some(line) = lines.next_line() {
                    match decode_sse_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Done => {
                            yield Ok(StreamChunk::done());
                            return;
                        }
                        SseLine::Chunk(chunk) => yield Ok(chunk),
                    }
                }
            }

            // Trailing line without a newline.
            match decode_sse_line(&lines.finish()) {
                SseLine::Done => yield Ok(StreamChunk::done()),
                SseLine::Chunk(chunk) => yield Ok(chunk),
                SseLine::Skip => {}
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Accept arguments as a JSON string or an inline object; anything else is empty.
fn parse_arguments(raw: Value) -> Map<String, Value> {
    let parsed = match raw {
        Value::String(s) => serde_json::from_str::<Value>(&s).unwrap_or_else(|e| {
            warn!(error = %e, "tool call arguments are not valid JSON; using empty parameters");
            Value::Null
        }),
        other => other,
    };
    match parsed {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn message_to_wire(msg: &Message, include_tool_linkage: bool) -> Value {
    let mut wire = json!({ "role": msg.role.to_string(), "content": msg.content });
    if !include_tool_linkage {
        return wire;
    }

    match msg.role {
        Role::Assistant if msg.has_tool_calls() => {
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": Value::Object(tc.parameters.clone()).to_string(),
                        }
                    })
                })
                .collect();
            wire["tool_calls"] = calls.into();
            if msg.content.is_empty() {
                wire["content"] = Value::Null;
            }
        }
        Role::Tool => {
            if let Some(id) = msg.tool_call_id() {
                wire["tool_call_id"] = id.into();
            }
        }
        _ => {}
    }
    wire
}

// Wire response types (internal)

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}
