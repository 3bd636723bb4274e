//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use super::arguments::ToolArguments;
use super::types::{ToolParameters, ToolSchema};
use crate::error::{ChofeshError, Result};

static FUNCTION_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").expect("function name regex must compile")
});

/// A named, schema-described capability the model may ask to invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Execute the tool.
    ///
    /// An `Err` aborts this single invocation. A successful value that happens
    /// to describe an error is still a normal result.
    async fn execute(&self, args: &ToolArguments) -> Result<Value>;

    /// Check the tool's own configuration. Called by [`validated`].
    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    /// Describe the tool for the endpoint. Built fresh on every call.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

/// Run a tool's configuration check at construction time.
///
/// ```
/// use chofesh::tools::{validated, FnTool, ToolParameters};
///
/// let tool = validated(FnTool::new("ping", "Reply with pong", ToolParameters::empty(), |_args| async {
///     Ok(serde_json::json!("pong"))
/// }));
/// assert!(tool.is_ok());
/// ```
pub fn validated<T: Tool>(tool: T) -> Result<T> {
    tool.validate_config()?;
    Ok(tool)
}

type ToolHandler =
    dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync;

/// Closure-based tool for quick tool creation.
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Create a tool from a closure, failing fast on an invalid name or schema.
    pub fn try_new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        validated(Self::new(name, description, parameters, handler))
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<Value> {
        (self.handler)(args.clone()).await
    }

    fn validate_config(&self) -> Result<()> {
        if !FUNCTION_NAME_RE.is_match(&self.name) {
            return Err(ChofeshError::Configuration(format!(
                "invalid tool name '{}': expected 1-64 characters of [a-zA-Z0-9_-]",
                self.name
            )));
        }
        if self.parameters.schema.get("type").and_then(Value::as_str) != Some("object") {
            return Err(ChofeshError::Configuration(format!(
                "tool '{}' parameters must be an object schema",
                self.name
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(name: &str, parameters: ToolParameters) -> Result<FnTool> {
        FnTool::try_new(name, "noop", parameters, |_args| async { Ok(Value::Null) })
    }

    #[test]
    fn try_new_rejects_bad_names() {
        assert!(noop("web_search", ToolParameters::empty()).is_ok());
        let too_long = "x".repeat(65);
        for bad in ["", "has space", "dots.not.allowed", too_long.as_str()] {
            let err = noop(bad, ToolParameters::empty()).unwrap_err();
            assert!(matches!(err, ChofeshError::Configuration(_)), "{bad:?}");
        }
    }

    #[test]
    fn try_new_rejects_non_object_schema() {
        let err = noop("t", ToolParameters::from_schema(json!({"type": "string"}))).unwrap_err();
        assert!(err.to_string().contains("object schema"));
    }

    #[test]
    fn schema_reflects_current_definition() {
        let tool = FnTool::new(
            "echo",
            "Echo text back",
            ToolParameters::object().string("text", "Text", true).build(),
            |_args| async { Ok(Value::Null) },
        );
        let schema = tool.schema();
        assert_eq!(schema.name, "echo");
        assert_eq!(
            schema.to_function_json(),
            json!({
                "type": "function",
                "function": {
                    "name": "echo",
                    "description": "Echo text back",
                    "parameters": {
                        "type": "object",
                        "properties": {"text": {"type": "string", "description": "Text"}},
                        "required": ["text"],
                    }
                }
            })
        );
    }
}
