//! Configuration: explicit structs consumed by the core, plus a layered
//! loader (code > env > config file) for embedding applications.

mod settings;

pub use settings::Settings;

use std::fmt;
use std::time::Duration;

use bon::Builder;
use serde_json::{Map, Value};

/// Default endpoint base URL.
pub const DEFAULT_BASE_URL: &str = "https://chofesh.ai/api";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-oss-120b";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default cap on tool-execution passes per `process` call.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 5;

/// Settings for the HTTP transport.
#[derive(Clone)]
pub struct ClientConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Applied per HTTP call, covering connect and read.
    pub timeout: Duration,
    /// Allow construction without a key; the first request then fails with
    /// an authentication error instead.
    pub defer_auth_check: bool,
    /// Resend tool calls / tool call ids on historical messages.
    pub include_tool_linkage: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            defer_auth_check: false,
            include_tool_linkage: false,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("defer_auth_check", &self.defer_auth_check)
            .field("include_tool_linkage", &self.include_tool_linkage)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_deferred_auth_check(mut self, defer: bool) -> Self {
        self.defer_auth_check = defer;
        self
    }

    pub fn with_tool_linkage(mut self, include: bool) -> Self {
        self.include_tool_linkage = include;
        self
    }
}

/// Defaults and limits for the agent loop.
#[derive(Debug, Clone, Builder, PartialEq)]
pub struct AgentConfig {
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    #[builder(default = DEFAULT_MAX_TOOL_ITERATIONS)]
    pub max_tool_iterations: usize,
    /// Check tool parameters against their schema before executing.
    #[builder(default)]
    pub validate_tool_arguments: bool,
    /// Passthrough request keys sent on every completion.
    #[builder(default)]
    pub extra: Map<String, Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
