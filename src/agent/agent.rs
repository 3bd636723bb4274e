//! Core Agent struct with process/stream capabilities.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::blocking::{self, BlockingStream};
use crate::client::{ChatClient, CompletionRequest, CompletionTransport};
use crate::config::{AgentConfig, ClientConfig};
use crate::error::Result;
use crate::tools::{Tool, ToolArguments, ToolRegistry, ToolSchema};
use crate::types::*;

/// Result of one [`Agent::process_detailed`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRun {
    /// The final assistant message.
    pub message: Message,
    /// Seed history plus every assistant and tool message appended by the loop.
    pub messages: Vec<Message>,
    /// Tool-execution passes performed.
    pub iterations: usize,
    /// Completion requests issued.
    pub requests: usize,
}

/// Drives a completion endpoint and executes the tools the model asks for.
///
/// `process` borrows the agent immutably, so several calls may run at once
/// against one `Arc<Agent>`. Adding or removing tools needs `&mut self` and is
/// therefore impossible while any call is in flight.
pub struct Agent {
    transport: Arc<dyn CompletionTransport>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent over any transport.
    pub fn new(transport: impl CompletionTransport + 'static) -> Self {
        Self::from_transport(Arc::new(transport))
    }

    /// Create an agent over a shared transport.
    pub fn from_transport(transport: Arc<dyn CompletionTransport>) -> Self {
        Self {
            transport,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    /// Create an agent backed by a [`ChatClient`].
    pub fn from_client_config(config: ClientConfig) -> Result<Self> {
        Ok(Self::new(ChatClient::new(config)?))
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.add_tool(tool);
        self
    }

    /// Register a tool. A tool with the same name is replaced and returned.
    pub fn add_tool(&mut self, tool: impl Tool + 'static) -> Option<Arc<dyn Tool>> {
        self.tools.add(Arc::new(tool))
    }

    /// Register a tool that is also held elsewhere.
    pub fn add_shared_tool(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        self.tools.add(tool)
    }

    pub fn remove_tool(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Schemas advertised on the next request.
    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools.schemas()
    }

    pub fn model(&self) -> &str {
        self.transport.model()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the tool loop over `messages` and return the final assistant message.
    pub async fn process(&self, messages: &[Message], options: &CompletionOptions) -> Result<Message> {
        Ok(self.process_detailed(messages, options).await?.message)
    }

    /// Run the tool loop and return the full working history alongside the answer.
    pub async fn process_detailed(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<AgentRun> {
        let mut request = self.build_request(messages.to_vec(), options, true)?;
        let max_iterations = self.config.max_tool_iterations;

        debug!(model = self.model(), messages = messages.len(), "agent: initial request");
        let mut response = self.transport.complete(&request).await?;
        let mut requests = 1;
        request.messages.push(response.clone());

        let mut iterations = 0;
        while response.has_tool_calls() && iterations < max_iterations {
            iterations += 1;
            debug!(iteration = iterations, calls = response.tool_calls.len(), "agent: executing tools");

            let mut calls = std::mem::take(&mut response.tool_calls);
            let mut tool_messages = Vec::with_capacity(calls.len());
            for call in &mut calls {
                tool_messages.push(self.run_call(call).await);
            }
            response.tool_calls = calls;

            // The resolved calls replace the unresolved copy already in history.
            if let Some(last) = request.messages.last_mut() {
                *last = response.clone();
            }
            request.messages.extend(tool_messages);

            response = self.transport.complete(&request).await?;
            requests += 1;
            request.messages.push(response.clone());
        }

        if response.has_tool_calls() {
            debug!(max_iterations, "agent: iteration cap reached with pending tool calls");
        }

        Ok(AgentRun {
            message: response,
            messages: request.messages,
            iterations,
            requests,
        })
    }

    /// Open a streamed completion. Tools are not advertised in streaming mode.
    pub async fn stream(&self, messages: &[Message], options: &CompletionOptions) -> Result<ChunkStream> {
        let request = self.build_request(messages.to_vec(), options, false)?;
        debug!(model = self.model(), messages = messages.len(), "agent: stream request");
        self.transport.stream(&request).await
    }

    /// Run one registered tool directly. Every failure is a tool failure.
    pub async fn execute_tool(&self, name: &str, parameters: Map<String, Value>) -> Result<Value> {
        let args = ToolArguments::new(parameters);
        self.tools
            .execute(name, &args, self.config.validate_tool_arguments)
            .await
    }

    /// Blocking variant of [`Agent::process`]. Must not be called from async code.
    pub fn process_blocking(&self, messages: &[Message], options: &CompletionOptions) -> Result<Message> {
        blocking::block_on(self.process(messages, options))?
    }

    /// Blocking variant of [`Agent::process_detailed`].
    pub fn process_detailed_blocking(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<AgentRun> {
        blocking::block_on(self.process_detailed(messages, options))?
    }

    /// Blocking variant of [`Agent::stream`]; chunks are pulled lazily.
    pub fn stream_blocking(&self, messages: &[Message], options: &CompletionOptions) -> Result<BlockingStream> {
        BlockingStream::open(self.stream(messages, options))
    }

    /// Blocking variant of [`Agent::execute_tool`].
    pub fn execute_tool_blocking(&self, name: &str, parameters: Map<String, Value>) -> Result<Value> {
        blocking::block_on(self.execute_tool(name, parameters))?
    }

    async fn run_call(&self, call: &mut ToolCall) -> Message {
        let args = ToolArguments::new(call.parameters.clone());
        match self
            .tools
            .execute(&call.name, &args, self.config.validate_tool_arguments)
            .await
        {
            Ok(value) => {
                let content = tool_output_to_string(&value);
                call.set_result(value);
                Message::tool_result(call, content)
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "tool execution failed");
                let text = e.to_string();
                call.set_error(text.clone());
                Message::tool_error(call, &text)
            }
        }
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        options: &CompletionOptions,
        with_tools: bool,
    ) -> Result<CompletionRequest> {
        let temperature = options.temperature.unwrap_or(self.config.temperature);
        let max_tokens = options.max_tokens.or(self.config.max_tokens);
        validate_sampling(temperature, max_tokens)?;

        let mut extra = self.config.extra.clone();
        extra.extend(options.extra.clone());

        let tools = with_tools
            .then(|| self.tool_schemas())
            .filter(|schemas| !schemas.is_empty());

        Ok(CompletionRequest {
            messages,
            temperature,
            max_tokens,
            tools,
            extra,
        })
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.model())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish()
    }
}

/// Text sent back to the model for a tool's return value.
fn tool_output_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChofeshError;
    use crate::tools::{FnTool, ToolParameters};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned responses and records every request.
    struct Replay {
        responses: Mutex<Vec<Message>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl Replay {
        fn new(mut responses: Vec<Message>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionTransport for Replay {
        fn model(&self) -> &str {
            "replay"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Message> {
            self.seen.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ChofeshError::InvalidState("no scripted response".into()))
        }

        async fn stream(&self, _request: &CompletionRequest) -> Result<ChunkStream> {
            Err(ChofeshError::InvalidState("not streamed".into()))
        }
    }

    fn call(name: &str) -> Message {
        Message::assistant("").with_tool_calls(vec![ToolCall::new("c1", name, Map::new())])
    }

    #[test]
    fn output_strings_are_not_quoted() {
        assert_eq!(tool_output_to_string(&json!("plain")), "plain");
        assert_eq!(tool_output_to_string(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(tool_output_to_string(&json!(3)), "3");
        assert_eq!(tool_output_to_string(&Value::Null), "null");
    }

    #[tokio::test]
    async fn caller_options_override_agent_defaults() {
        let replay = Arc::new(Replay::new(vec![Message::assistant("ok")]));
        let mut extra = Map::new();
        extra.insert("top_p".into(), json!(0.5));
        extra.insert("seed".into(), json!(1));
        let agent = Agent::from_transport(replay.clone()).with_config(
            AgentConfig::builder().temperature(0.1).max_tokens(10).extra(extra).build(),
        );

        let options = CompletionOptions::default()
            .with_temperature(1.5)
            .with_extra("seed", json!(7));
        agent.process(&[Message::user("hi")], &options).await.unwrap();

        let seen = replay.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, 1.5);
        assert_eq!(seen[0].max_tokens, Some(10));
        assert_eq!(seen[0].extra["seed"], 7);
        assert_eq!(seen[0].extra["top_p"], 0.5);
        assert!(seen[0].tools.is_none());
    }

    #[tokio::test]
    async fn invalid_temperature_fails_before_any_request() {
        let replay = Arc::new(Replay::new(vec![]));
        let agent = Agent::from_transport(replay.clone());
        let err = agent
            .process(&[Message::user("hi")], &CompletionOptions::default().with_temperature(3.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ChofeshError::Validation(_)));
        assert!(replay.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolved_calls_are_visible_in_history() {
        let replay = Arc::new(Replay::new(vec![call("shout"), Message::assistant("done")]));
        let agent = Agent::from_transport(replay.clone()).with_tool(FnTool::new(
            "shout",
            "Shout",
            ToolParameters::empty(),
            |_args| async { Ok(json!("HEY")) },
        ));

        let run = agent
            .process_detailed(&[Message::user("go")], &CompletionOptions::default())
            .await
            .unwrap();

        assert_eq!(run.requests, 2);
        assert_eq!(run.iterations, 1);
        assert_eq!(run.messages.len(), 4);
        assert_eq!(run.messages[1].tool_calls[0].result, Some(json!("HEY")));
        assert_eq!(run.messages[2].role, Role::Tool);
        assert_eq!(run.messages[2].content, "HEY");
        assert_eq!(run.messages[2].tool_call_id(), Some("c1"));

        let seen = replay.seen.lock().unwrap();
        assert_eq!(seen[1].messages.len(), 3);
        assert_eq!(seen[1].tools.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn stream_never_advertises_tools() {
        struct StreamProbe(Mutex<Option<CompletionRequest>>);

        #[async_trait]
        impl CompletionTransport for StreamProbe {
            fn model(&self) -> &str {
                "probe"
            }
            async fn complete(&self, _request: &CompletionRequest) -> Result<Message> {
                Err(ChofeshError::InvalidState("not completed".into()))
            }
            async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream> {
                *self.0.lock().unwrap() = Some(request.clone());
                Ok(Box::pin(futures::stream::empty()))
            }
        }

        let probe = Arc::new(StreamProbe(Mutex::new(None)));
        let agent = Agent::from_transport(probe.clone()).with_tool(FnTool::new(
            "noop",
            "Nothing",
            ToolParameters::empty(),
            |_args| async { Ok(Value::Null) },
        ));
        agent
            .stream(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();

        let seen = probe.0.lock().unwrap();
        assert!(seen.as_ref().unwrap().tools.is_none());
    }

    #[tokio::test]
    async fn execute_tool_reports_missing_tool() {
        let agent = Agent::from_transport(Arc::new(Replay::new(vec![])));
        let err = agent.execute_tool("ghost", Map::new()).await.unwrap_err();
        assert_eq!(err.tool_name(), Some("ghost"));
        assert!(err.to_string().contains("not found"));
    }
}
