//! Tool contract, registry and helpers.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::ToolRegistry;
pub use tool::{validated, FnTool, Tool};
pub use types::{ParameterBuilder, ToolParameters, ToolSchema};
pub use validation::validate_arguments;
