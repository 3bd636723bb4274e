//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentRun};
pub use crate::blocking::BlockingStream;
pub use crate::client::{ChatClient, CompletionRequest, CompletionTransport};
pub use crate::config::{AgentConfig, ClientConfig, Settings};
pub use crate::conversation::Conversation;
pub use crate::error::{ChofeshError, Result};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{
    ChunkStream, CompletionOptions, Message, Role, StreamChunk, ToolCall, Usage,
};
pub use crate::util::RetryPolicy;
