//! Remote tool server collaborator seam.
//!
//! A [`ToolServer`] is anything that can advertise tools and invoke them by
//! name over some transport. The transport itself is out of scope here;
//! implementors wrap whatever client they use and surface this contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WeftError;

/// A tool advertised by a remote server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerToolSpec {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema for the tool's input (typically `properties` +
    /// `required`).
    pub input_schema: Value,
}

/// Outcome of a remote tool invocation.
///
/// A server may report failure in-band (`is_error`) or by returning an
/// `Err` from [`ToolServer::call_tool`]; the dispatch loop merges both into
/// the same tagged error string.
#[derive(Debug, Clone)]
pub struct ServerToolOutcome {
    pub is_error: bool,
    pub content: Value,
}

/// Remote tool server contract consumed by the registry and run loop.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Short label used to namespace this server's tool names.
    fn label(&self) -> &str;

    /// Advertise the server's tools.
    async fn list_tools(&self) -> Result<Vec<ServerToolSpec>, WeftError>;

    /// Invoke a tool by its server-side (un-namespaced) name.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ServerToolOutcome, WeftError>;
}
