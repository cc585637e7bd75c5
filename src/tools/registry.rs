//! Per-agent tool registry.
//!
//! Merges three capability sources into one flat name → invoker table:
//! remote tool servers (names namespaced `{label}_{tool}`), local tools,
//! and a synthesized `CallSubAgent` entry when the agent declares
//! sub-agents. Any name collision across sources is a construction-time
//! error. The dispatch kind is resolved here, once, so the run loop never
//! branches on name patterns.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::WeftError;
use crate::provider::ToolSpec;
use crate::util::sanitize_tool_name;

use super::server::ToolServer;
use super::tool::Tool;

/// Name of the synthesized sub-agent dispatch tool.
pub const CALL_SUB_AGENT: &str = "CallSubAgent";

/// How a registered name is invoked.
pub enum Invoker {
    Local(Arc<dyn Tool>),
    Remote {
        server: Arc<dyn ToolServer>,
        /// Server-side (un-namespaced) tool name.
        tool: String,
    },
    SubAgent,
}

impl Invoker {
    /// Span name recorded for dispatches through this invoker.
    pub fn trace_name(&self) -> &'static str {
        match self {
            Invoker::Local(_) => "tool_call",
            Invoker::Remote { .. } => "remote_tool_call",
            Invoker::SubAgent => "call_sub_agent",
        }
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invoker::Local(tool) => f.debug_tuple("Local").field(&tool.name()).finish(),
            Invoker::Remote { server, tool } => f
                .debug_struct("Remote")
                .field("server", &server.label())
                .field("tool", tool)
                .finish(),
            Invoker::SubAgent => write!(f, "SubAgent"),
        }
    }
}

/// Flat capability table for one agent, built once and memoized.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    invokers: HashMap<String, Invoker>,
}

impl ToolRegistry {
    /// Merge remote servers, local tools, and sub-agent dispatch into one
    /// registry. Fails fast on any name collision across sources.
    pub async fn build(
        servers: &[Arc<dyn ToolServer>],
        tools: &[Arc<dyn Tool>],
        sub_agent_names: &[String],
    ) -> Result<Self, WeftError> {
        let mut registry = Self::default();

        for server in servers {
            let label = sanitize_tool_name(server.label());
            for tool in server.list_tools().await? {
                let name = format!("{label}_{}", sanitize_tool_name(&tool.name));
                let description = tool
                    .description
                    .unwrap_or_else(|| format!("Remote tool: {}", tool.name));
                registry.insert(
                    ToolSpec {
                        name,
                        description,
                        parameters: object_schema(&tool.input_schema),
                    },
                    Invoker::Remote {
                        server: Arc::clone(server),
                        tool: tool.name,
                    },
                )?;
            }
        }

        for tool in tools {
            registry.insert(
                ToolSpec {
                    name: sanitize_tool_name(tool.name()),
                    description: tool.description().to_string(),
                    parameters: tool.parameters().schema.clone(),
                },
                Invoker::Local(Arc::clone(tool)),
            )?;
        }

        if !sub_agent_names.is_empty() {
            registry.insert(
                ToolSpec {
                    name: CALL_SUB_AGENT.to_string(),
                    description: "Call a sub-agent with a given request. The sub-agent runs \
                                  with the caller's context plus the request."
                        .to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "sub_agent": {
                                "type": "string",
                                "description": "The name of the sub-agent to call",
                                "enum": sub_agent_names,
                            },
                            "request": {
                                "type": "string",
                                "description": "The request to send to the sub-agent",
                            },
                        },
                        "required": ["sub_agent", "request"],
                        "additionalProperties": false,
                    }),
                },
                Invoker::SubAgent,
            )?;
        }

        Ok(registry)
    }

    fn insert(&mut self, spec: ToolSpec, invoker: Invoker) -> Result<(), WeftError> {
        if self.invokers.contains_key(&spec.name) {
            return Err(WeftError::Configuration(format!(
                "Tool name conflict: {}. Agent already has a tool with this name.",
                spec.name
            )));
        }
        self.invokers.insert(spec.name.clone(), invoker);
        self.specs.push(spec);
        Ok(())
    }

    /// Ordered tool specs sent to the provider.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Resolve a model-requested name to its invoker.
    pub fn get(&self, name: &str) -> Option<&Invoker> {
        self.invokers.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Wrap a remote server's `properties`/`required` into a strict object
/// schema, tolerating servers that already send a full schema.
fn object_schema(input_schema: &Value) -> Value {
    json!({
        "type": "object",
        "properties": input_schema.get("properties").cloned().unwrap_or_else(|| json!({})),
        "required": input_schema.get("required").cloned().unwrap_or_else(|| json!([])),
        "additionalProperties": false,
    })
}
