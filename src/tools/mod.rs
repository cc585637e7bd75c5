//! Tool system: local tools, remote tool servers, and the per-agent
//! registry that merges them with sub-agent dispatch.

pub mod registry;
pub mod server;
pub mod tool;

pub use registry::{Invoker, ToolRegistry, CALL_SUB_AGENT};
pub use server::{ServerToolOutcome, ServerToolSpec, ToolServer};
pub use tool::{FunctionTool, ParameterBuilder, Tool, ToolParameters};
