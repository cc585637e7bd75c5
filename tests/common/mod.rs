//! Shared test helpers: a scripted provider that replays canned replies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use weft::error::WeftError;
use weft::provider::{CompletionRequest, ModelProvider, ModelReply, ToolCallRequest};
use weft::types::Message;

/// Owned snapshot of one completion request, for assertions after the run.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub system: String,
    pub context: Vec<Message>,
    pub tool_names: Vec<String>,
    pub web_search: bool,
}

/// Provider that replays a fixed script of replies and records every
/// request it sees. When the script runs dry it either repeats a standing
/// tool call (ceiling tests) or fails with a clear error.
pub struct ScriptedProvider {
    replies: Mutex<Vec<ModelReply>>,
    repeat_tool: Option<String>,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            repeat_tool: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that requests `tool` on every turn, forever, with a
    /// unique call id each time. Only a turn ceiling stops it.
    pub fn always_calling(tool: &str) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            repeat_tool: Some(tool.to_string()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Convenience: a single tool-call reply with the given call id.
pub fn tool_call_reply(call_id: &str, name: &str, arguments: &str) -> ModelReply {
    ModelReply::tool_calls(vec![ToolCallRequest {
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }])
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply, WeftError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(RecordedRequest {
            model: request.model.to_string(),
            system: request.system.to_string(),
            context: request.context.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            web_search: request.web_search,
        });

        if let Some(reply) = self.replies.lock().unwrap().get(n) {
            return Ok(reply.clone());
        }

        if let Some(tool) = &self.repeat_tool {
            return Ok(tool_call_reply(&format!("call-{n}"), tool, "{}"));
        }
        Err(WeftError::Provider {
            provider: "scripted".into(),
            message: format!("script exhausted after {n} replies"),
        })
    }
}
