//! Model provider trait and the OpenAI implementation.
//!
//! The run loop only knows this seam: a completion request goes out, a
//! structured [`ModelReply`] comes back. Callers needing timeouts or
//! retries impose them here, at the provider boundary.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WeftError;
use crate::types::Message;

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One outbound completion request: the synthesized system turn, the full
/// running context, and the agent's tool specs.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub context: &'a [Message],
    pub tools: &'a [ToolSpec],
    /// Enable the provider's hosted web-search tool, where it has one.
    pub web_search: bool,
}

/// Why the model stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finish {
    /// Final textual answer, nothing outstanding.
    Complete,
    /// The model requested tool invocations.
    ToolCalls,
    /// Provider-side content filtering. Terminal, not retried.
    ContentFilter,
    /// Output truncated (length/max tokens). Terminal, not retried.
    Truncated,
    /// Provider reported failure. Terminal, not retried.
    Failed(String),
}

/// A tool call requested by the model. Arguments are raw JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// Structured provider reply consumed by the run loop.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub finish: Finish,
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    /// A plain final-text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            finish: Finish::Complete,
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply requesting tool invocations.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            finish: Finish::ToolCalls,
            text: String::new(),
            tool_calls: calls,
        }
    }
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// One provider round-trip.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply, WeftError>;
}
