//! Agent loop: completion requests interleaved with local tool execution.

mod agent;

pub use agent::{Agent, AgentRun};
