//! Multi-turn chat sessions over a shared [`Agent`].

use std::path::Path;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::agent::Agent;
use crate::blocking::{self, BlockingStream};
use crate::error::{ChofeshError, Result};
use crate::types::*;

/// An append-only message history bound to an agent.
///
/// The agent is shared, not owned: several conversations may use one
/// `Arc<Agent>` concurrently, each with its own history.
#[derive(Debug, Clone)]
pub struct Conversation {
    agent: Arc<Agent>,
    id: Option<String>,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            id: None,
            messages: Vec::new(),
        }
    }

    /// Seed the history with a system message.
    pub fn with_system_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Assign a fresh random id.
    pub fn with_generated_id(self) -> Self {
        self.with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Send a user message with the agent's default sampling options.
    pub async fn send(&mut self, content: impl Into<String>) -> Result<Message> {
        self.send_with(content, &CompletionOptions::default()).await
    }

    /// Send a user message and append the agent's final answer.
    ///
    /// The user message stays in the history even if the request fails.
    pub async fn send_with(
        &mut self,
        content: impl Into<String>,
        options: &CompletionOptions,
    ) -> Result<Message> {
        self.messages.push(Message::user(content));
        let response = self.agent.process(&self.messages, options).await?;
        self.messages.push(response.clone());
        Ok(response)
    }

    /// Blocking variant of [`Conversation::send_with`]. Must not be called from async code.
    pub fn send_blocking(
        &mut self,
        content: impl Into<String>,
        options: &CompletionOptions,
    ) -> Result<Message> {
        blocking::block_on(self.send_with(content, options))?
    }

    /// Send a user message and stream the reply.
    ///
    /// The concatenated reply is appended as one assistant message when the
    /// terminal chunk arrives. Dropping the stream early appends nothing.
    pub async fn stream_send(
        &mut self,
        content: impl Into<String>,
        options: &CompletionOptions,
    ) -> Result<BoxStream<'_, Result<StreamChunk>>> {
        self.messages.push(Message::user(content));
        let mut inner = self.agent.stream(&self.messages, options).await?;
        let model = self.agent.model().to_string();
        let messages = &mut self.messages;

        let stream = async_stream::stream! {
            let mut text = String::new();
            while let Some(item) = inner.next().await {
                match item {
                    Ok(chunk) => {
                        text.push_str(&chunk.content);
                        let is_final = chunk.is_final;
                        yield Ok(chunk);
                        if is_final {
                            debug!(chars = text.len(), "stream complete; appending reply");
                            messages.push(Message::assistant(std::mem::take(&mut text)).with_model(model.clone()));
                            break;
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Blocking variant of [`Conversation::stream_send`]; chunks are pulled lazily.
    pub fn stream_send_blocking(
        &mut self,
        content: impl Into<String>,
        options: &CompletionOptions,
    ) -> Result<ConversationStream<'_>> {
        self.messages.push(Message::user(content));
        let inner = self.agent.stream_blocking(&self.messages, options)?;
        Ok(ConversationStream {
            inner,
            messages: &mut self.messages,
            model: self.agent.model().to_string(),
            text: String::new(),
            finished: false,
        })
    }

    /// Drop everything after the leading run of system messages.
    pub fn clear(&mut self) {
        let keep = self
            .messages
            .iter()
            .take_while(|m| m.role == Role::System)
            .count();
        self.messages.truncate(keep);
    }

    /// Token usage summed over every assistant message in the history.
    pub fn total_usage(&self) -> Usage {
        self.messages
            .iter()
            .filter_map(Message::usage)
            .fold(Usage::default(), |mut total, usage| {
                total.merge(&usage);
                total
            })
    }

    /// Serialize the history and a description of the agent. The agent itself is not saved.
    pub fn to_record(&self) -> Value {
        json!({
            "conversation_id": self.id,
            "messages": self.messages.iter().map(Message::to_record).collect::<Vec<_>>(),
            "agent": {
                "model": self.agent.model(),
                "tools": self.agent.tools().names(),
            },
        })
    }

    /// Rebuild a conversation from [`Conversation::to_record`] output, attached to `agent`.
    pub fn from_record(record: Value, agent: Arc<Agent>) -> Result<Self> {
        let raw: RawConversation = serde_json::from_value(record)
            .map_err(|e| ChofeshError::Validation(format!("invalid conversation record: {e}")))?;
        let messages = raw
            .messages
            .into_iter()
            .map(Message::from_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            agent,
            id: raw.conversation_id,
            messages,
        })
    }

    /// Write the record as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.to_record())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Read a record written by [`Conversation::save`].
    pub fn load(path: impl AsRef<Path>, agent: Arc<Agent>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let record: Value = serde_json::from_str(&text)?;
        Self::from_record(record, agent)
    }
}

#[derive(Deserialize)]
struct RawConversation {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
}

/// Blocking chunk iterator returned by [`Conversation::stream_send_blocking`].
pub struct ConversationStream<'a> {
    inner: BlockingStream,
    messages: &'a mut Vec<Message>,
    model: String,
    text: String,
    finished: bool,
}

impl Iterator for ConversationStream<'_> {
    type Item = Result<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.inner.next();
        match &item {
            Some(Ok(chunk)) => {
                self.text.push_str(&chunk.content);
                if chunk.is_final {
                    self.finished = true;
                    let content = std::mem::take(&mut self.text);
                    self.messages
                        .push(Message::assistant(content).with_model(self.model.clone()));
                }
            }
            Some(Err(_)) | None => self.finished = true,
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CompletionRequest, CompletionTransport};
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl CompletionTransport for Silent {
        fn model(&self) -> &str {
            "silent"
        }
        async fn complete(&self, _request: &CompletionRequest) -> Result<Message> {
            Err(ChofeshError::api(503, "unavailable"))
        }
        async fn stream(&self, _request: &CompletionRequest) -> Result<ChunkStream> {
            Err(ChofeshError::api(503, "unavailable"))
        }
    }

    fn agent() -> Arc<Agent> {
        Arc::new(Agent::new(Silent))
    }

    #[test]
    fn clear_keeps_only_leading_system_messages() {
        let mut conversation = Conversation::new(agent()).with_system_message("be brief");
        conversation.messages.push(Message::user("a"));
        conversation.messages.push(Message::system("late"));
        conversation.messages.push(Message::assistant("b"));

        conversation.clear();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].content, "be brief");
    }

    #[tokio::test]
    async fn failed_send_keeps_user_message() {
        let mut conversation = Conversation::new(agent());
        let err = conversation.send("hello").await.unwrap_err();
        assert!(matches!(err, ChofeshError::Api { status: 503, .. }));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::User);
    }

    #[test]
    fn from_record_rejects_bad_messages() {
        let err = Conversation::from_record(json!({"messages": [{"role": 5}]}), agent()).unwrap_err();
        assert!(matches!(err, ChofeshError::Validation(_)));
        let err = Conversation::from_record(json!("nope"), agent()).unwrap_err();
        assert!(matches!(err, ChofeshError::Validation(_)));
    }

    #[test]
    fn total_usage_sums_reported_usage() {
        let mut conversation = Conversation::new(agent());
        conversation.messages.push(
            Message::assistant("a")
                .with_metadata("usage", json!({"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5})),
        );
        conversation.messages.push(
            Message::assistant("b")
                .with_metadata("usage", json!({"prompt_tokens": 4, "completion_tokens": 1, "total_tokens": 5})),
        );
        let usage = conversation.total_usage();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.total_tokens, 10);
    }
}
