//! Error types for Chofesh.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Boxed underlying cause of a tool failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Root error type for all Chofesh operations.
#[derive(Error, Debug)]
pub enum ChofeshError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Structured error body, when the server sent parseable JSON.
        body: Option<serde_json::Value>,
    },

    #[error("Tool '{tool_name}' execution failed: {message}")]
    ToolExecution {
        tool_name: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ChofeshError {
    /// Create an API error without a structured body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Create a tool execution error without an underlying cause.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary failure raised while running `tool_name`.
    /// A tool failure already attributed to `tool_name` passes through unchanged.
    pub fn from_tool_failure(tool_name: &str, err: ChofeshError) -> Self {
        if matches!(&err, Self::ToolExecution { tool_name: inner, .. } if inner == tool_name) {
            return err;
        }
        Self::ToolExecution {
            tool_name: tool_name.to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Map a reqwest failure, keeping timeouts distinct from other network errors.
    pub fn from_http(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout.as_millis() as u64)
        } else {
            Self::Network(err)
        }
    }

    /// Name of the tool involved, for tool failures.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolExecution { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }

    /// Server-supplied retry hint, for rate-limit failures.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Validation => RecoverySuggestion::FixRequest,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(", retry after {secs}s"))
        .unwrap_or_default()
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ChofeshError>;
