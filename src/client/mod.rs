//! Transport boundary to the remote chat-completions endpoint.

pub mod chat;
pub mod http;

pub use chat::ChatClient;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::tools::ToolSchema;
use crate::types::{ChunkStream, Message};

/// Everything one completion request needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Omitted from the body when `None` or empty.
    pub tools: Option<Vec<ToolSchema>>,
    /// Passthrough body keys, applied last.
    pub extra: Map<String, Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: crate::config::DEFAULT_TEMPERATURE,
            max_tokens: None,
            tools: None,
            extra: Map::new(),
        }
    }
}

/// A completion endpoint the agent loop can drive.
///
/// [`ChatClient`] is the HTTP implementation; tests substitute scripted ones.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Model identifier stamped on returned messages.
    fn model(&self) -> &str;

    /// One non-streaming completion; returns the assistant message.
    async fn complete(&self, request: &CompletionRequest) -> Result<Message>;

    /// One streaming completion.
    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream>;
}
