//! Message types for conversation turns.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::{ChofeshError, Result};

use super::usage::Usage;

/// Metadata key linking a tool message back to its originating call.
pub const TOOL_CALL_ID_KEY: &str = "tool_call_id";
/// Metadata key naming the tool that produced a tool message.
pub const TOOL_NAME_KEY: &str = "tool_name";
/// Metadata key flagging a tool message as an error report.
pub const TOOL_ERROR_KEY: &str = "error";

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One requested invocation of a tool.
///
/// After the agent loop handles a call, exactly one of `result` / `error` is set.
/// A result may itself be JSON `null`; records keep that distinct from "no result".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(into = "ToolCallRecord", from = "ToolCallRecord")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub parameters: Map<String, Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Serialized form of [`ToolCall`].
#[derive(Serialize, Deserialize)]
struct ToolCallRecord {
    id: String,
    name: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
    /// Absent in older records; then a non-null `result` means present.
    #[serde(default)]
    has_result: Option<bool>,
}

impl From<ToolCall> for ToolCallRecord {
    fn from(call: ToolCall) -> Self {
        Self {
            id: call.id,
            name: call.name,
            parameters: call.parameters,
            has_result: Some(call.result.is_some()),
            result: call.result.unwrap_or(Value::Null),
            error: call.error,
        }
    }
}

impl From<ToolCallRecord> for ToolCall {
    fn from(record: ToolCallRecord) -> Self {
        let present = record.has_result.unwrap_or(!record.result.is_null());
        Self {
            id: record.id,
            name: record.name,
            parameters: record.parameters,
            result: present.then_some(record.result),
            error: record.error,
        }
    }
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
            result: None,
            error: None,
        }
    }

    /// Record a successful execution, clearing any earlier error.
    pub fn set_result(&mut self, result: Value) {
        self.result = Some(result);
        self.error = None;
    }

    /// Record a failed execution, clearing any earlier result.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.result = None;
    }

    /// Whether the call has been executed (successfully or not).
    pub fn is_resolved(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Message {
    /// Create a message with the given role and content, stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            model: None,
            tool_calls: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool-role message reporting a successful call.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message
            .metadata
            .insert(TOOL_CALL_ID_KEY.into(), Value::String(call.id.clone()));
        message
            .metadata
            .insert(TOOL_NAME_KEY.into(), Value::String(call.name.clone()));
        message
    }

    /// Create a tool-role message reporting a failed call.
    pub fn tool_error(call: &ToolCall, error: &str) -> Self {
        let mut message = Self::tool_result(call, format!("Error: {error}"));
        message.metadata.insert(TOOL_ERROR_KEY.into(), Value::Bool(true));
        message
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Id of the call a tool message answers.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.get(TOOL_CALL_ID_KEY).and_then(Value::as_str)
    }

    /// Whether this is a tool message reporting a failure.
    pub fn is_tool_error(&self) -> bool {
        self.role == Role::Tool
            && self
                .metadata
                .get(TOOL_ERROR_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    /// Finish reason reported by the endpoint for an assistant message.
    pub fn finish_reason(&self) -> Option<&str> {
        self.metadata.get("finish_reason").and_then(Value::as_str)
    }

    /// Token usage reported by the endpoint, if any.
    pub fn usage(&self) -> Option<Usage> {
        self.metadata
            .get("usage")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Serialize into a flat record. Absent optionals become explicit nulls.
    pub fn to_record(&self) -> Value {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rebuild a message from a record produced by [`Message::to_record`].
    pub fn from_record(record: Value) -> Result<Self> {
        serde_json::from_value(record)
            .map_err(|e| ChofeshError::Validation(format!("invalid message record: {e}")))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept RFC 3339 timestamps as well as naive ISO-8601 ones (read as UTC).
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
