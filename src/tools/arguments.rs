//! Typed access to the parameters of a tool call.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ChofeshError, Result};

/// Parameters passed to [`Tool::execute`](super::Tool::execute).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    inner: Map<String, Value>,
}

impl ToolArguments {
    pub fn new(inner: Map<String, Value>) -> Self {
        Self { inner }
    }

    /// Build from any JSON value; non-objects yield empty arguments.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::default(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.inner
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.inner)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.get_str_opt(key)
            .ok_or_else(|| missing(key, "string"))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.inner
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| missing(key, "integer"))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.inner
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(key, "number"))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.inner
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(key, "boolean"))
    }

    /// Deserialize all parameters into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.inner.clone()))
            .map_err(|e| ChofeshError::Validation(format!("invalid tool arguments: {e}")))
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(inner: Map<String, Value>) -> Self {
        Self::new(inner)
    }
}

fn missing(key: &str, expected: &str) -> ChofeshError {
    ChofeshError::Validation(format!("missing or non-{expected} argument '{key}'"))
}
