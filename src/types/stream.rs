//! Streaming types.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChofeshError;

use super::message::ToolCall;

/// One incremental fragment of a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StreamChunk {
    /// The text fragment (may be empty).
    pub content: String,
    /// Set on the terminal chunk.
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl StreamChunk {
    /// A non-terminal text fragment.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// The empty terminal chunk emitted on the stream terminator.
    pub fn done() -> Self {
        Self {
            is_final: true,
            ..Default::default()
        }
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.metadata.get("finish_reason").and_then(Value::as_str)
    }
}

/// A lazy, finite, non-restartable sequence of chunks.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ChofeshError>>;
