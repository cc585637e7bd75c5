//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentBuilder, AgentResponse, RunInput, RunStatus};
pub use crate::config::WeftConfig;
pub use crate::error::{Result, WeftError};
pub use crate::provider::ModelProvider;
pub use crate::runner::{RunReport, Runner};
pub use crate::tools::{FunctionTool, Tool, ToolParameters, ToolRegistry, ToolServer};
pub use crate::trace::{TraceNode, TraceSession};
pub use crate::types::{ContentPart, Message, Role};
