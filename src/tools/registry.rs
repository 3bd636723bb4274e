//! Name-keyed tool registry owned by an agent.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::arguments::ToolArguments;
use super::tool::Tool;
use super::types::ToolSchema;
use super::validation::validate_arguments;
use crate::error::{ChofeshError, Result};

/// Tools keyed by unique name, kept in registration order.
///
/// Registering a name that already exists replaces the earlier tool in place.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, returning the one it replaced, if any.
    pub fn add(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        debug!(tool = tool.name(), "registering tool");
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => Some(std::mem::replace(&mut self.tools[index], tool)),
            None => {
                self.tools.push(tool);
                None
            }
        }
    }

    /// Unregister a tool by name.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let index = self.tools.iter().position(|t| t.name() == name)?;
        Some(self.tools.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Current schemas for every registered tool, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Look up and run one tool.
    ///
    /// Lookup misses, argument violations and tool errors all surface as
    /// [`ChofeshError::ToolExecution`] naming the tool.
    pub async fn execute(&self, name: &str, args: &ToolArguments, validate: bool) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| ChofeshError::tool(name, format!("Tool '{name}' not found in registry")))?;

        if validate {
            validate_arguments(args.as_map(), &tool.parameters().schema)
                .map_err(|message| ChofeshError::tool(name, message))?;
        }

        tool.execute(args)
            .await
            .map_err(|e| ChofeshError::from_tool_failure(name, e))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
