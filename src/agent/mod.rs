//! Agent construction and the tool-dispatch run loop.
//!
//! An [`Agent`] is immutable configuration (name, purpose, model, declared
//! capabilities) plus a capability table built once and memoized. Each run
//! owns its context and threads it by value through the loop: every step
//! produces a new, longer sequence, which is what makes concurrent runs
//! against one agent safe.
//!
//! The loop is explicit (a context accumulator plus a shared
//! [`TurnBudget`]) rather than host-stack recursive, so long conversations
//! cannot grow the call stack. Sub-agent delegation still recurses logically: the
//! callee runs its own full loop against the caller's context plus the
//! delegated request, sharing the caller's trace session and turn budget.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config;
use crate::error::WeftError;
use crate::provider::{CompletionRequest, Finish, ModelProvider, ToolCallRequest};
use crate::tools::registry::{Invoker, ToolRegistry};
use crate::tools::server::ToolServer;
use crate::tools::tool::{FunctionTool, Tool, ToolParameters};
use crate::trace::TraceSession;
use crate::types::Message;
use crate::util::{sanitize_tool_name, tagged_uuid, value_to_string};

/// Default turn ceiling for a whole run, sub-agent turns included.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Terminal message reported when the turn ceiling is reached. Carries no
/// distinct status; callers check the message content.
pub const MAX_TURNS_MESSAGE: &str = "Maximum iterations reached";

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Error,
}

/// Terminal report of one agent run.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub status: RunStatus,
    pub final_message: String,
    /// Full conversation including the newly produced assistant turns and
    /// tool exchanges. Append-only; owned by the caller once returned.
    pub context: Vec<Message>,
}

/// Input to a run: fresh text or a caller-supplied context.
#[derive(Debug, Clone)]
pub enum RunInput {
    Text(String),
    Context(Vec<Message>),
}

impl RunInput {
    fn into_context(self) -> Vec<Message> {
        match self {
            RunInput::Text(text) => vec![Message::user(text)],
            RunInput::Context(context) => context,
        }
    }
}

impl From<&str> for RunInput {
    fn from(text: &str) -> Self {
        RunInput::Text(text.to_string())
    }
}

impl From<String> for RunInput {
    fn from(text: String) -> Self {
        RunInput::Text(text)
    }
}

impl From<Vec<Message>> for RunInput {
    fn from(context: Vec<Message>) -> Self {
        RunInput::Context(context)
    }
}

/// Shared counter bounding provider round-trips across an entire run,
/// sub-agent delegation included. Nothing else guarantees the model stops
/// requesting tools.
#[derive(Debug)]
pub struct TurnBudget {
    max: usize,
    used: AtomicUsize,
}

impl TurnBudget {
    pub fn new(max: usize) -> Self {
        Self { max, used: AtomicUsize::new(0) }
    }

    /// Charge one turn. Returns `false` once the ceiling is reached.
    pub fn charge(&self) -> bool {
        self.used.fetch_add(1, Ordering::SeqCst) < self.max
    }

    /// Turns charged so far (successful or not).
    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst).min(self.max)
    }
}

/// An LLM-backed agent: immutable configuration plus a memoized capability
/// table. Construct via [`Agent::builder`]; reuse across many runs.
pub struct Agent {
    id: String,
    name: String,
    purpose: String,
    model: String,
    provider: Arc<dyn ModelProvider>,
    tools: Vec<Arc<dyn Tool>>,
    servers: Vec<Arc<dyn ToolServer>>,
    sub_agents: Vec<Arc<Agent>>,
    web_search: bool,
    registry: OnceCell<ToolRegistry>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build (or fetch) the capability table. `run` calls this before its
    /// first provider request, so a name collision fails the first run
    /// deterministically. Remote servers make registry construction async,
    /// which keeps it out of `build()`; callers that want collisions
    /// surfaced at construction time should await `prepare()` right after
    /// building.
    pub async fn prepare(&self) -> Result<&ToolRegistry, WeftError> {
        self.registry
            .get_or_try_init(|| async {
                let sub_agent_names: Vec<String> =
                    self.sub_agents.iter().map(|a| a.name.clone()).collect();
                ToolRegistry::build(&self.servers, &self.tools, &sub_agent_names).await
            })
            .await
    }

    /// Run to a terminal state with a fresh trace and the default turn
    /// ceiling. Use [`crate::runner::Runner`] to keep the trace.
    pub async fn run(&self, input: impl Into<RunInput>) -> Result<AgentResponse, WeftError> {
        let trace = TraceSession::new();
        let budget = TurnBudget::new(DEFAULT_MAX_TURNS);
        self.run_with(input.into(), &trace, &budget).await
    }

    /// Run within a caller-owned trace session and turn budget. Boxed
    /// because sub-agent delegation recurses through dispatch.
    pub(crate) fn run_with<'a>(
        &'a self,
        input: RunInput,
        trace: &'a TraceSession,
        budget: &'a TurnBudget,
    ) -> Pin<Box<dyn Future<Output = Result<AgentResponse, WeftError>> + Send + 'a>> {
        Box::pin(async move {
            trace.start(
                "agent.run",
                json!({ "agent": self.name, "uuid": tagged_uuid("agent-run") }),
            );
            let result = self.drive(input, trace, budget).await;
            let status = match &result {
                Ok(response) => match response.status {
                    RunStatus::Completed => "completed",
                    RunStatus::Error => "error",
                },
                Err(_) => "failed",
            };
            let _ = trace.end_with(json!({ "status": status }));
            result
        })
    }

    async fn drive(
        &self,
        input: RunInput,
        trace: &TraceSession,
        budget: &TurnBudget,
    ) -> Result<AgentResponse, WeftError> {
        let registry = self.prepare().await?;
        let mut context = input.into_context();
        let system = self.system_prompt();

        loop {
            if !budget.charge() {
                warn!(agent = %self.name, turns = budget.used(), "turn ceiling reached");
                return Ok(AgentResponse {
                    status: RunStatus::Completed,
                    final_message: MAX_TURNS_MESSAGE.to_string(),
                    context,
                });
            }

            debug!(
                agent = %self.name,
                model = %self.model,
                messages = context.len(),
                "requesting completion"
            );
            let reply = self
                .provider
                .complete(CompletionRequest {
                    model: &self.model,
                    system: &system,
                    context: &context,
                    tools: registry.specs(),
                    web_search: self.web_search,
                })
                .await?;

            match reply.finish {
                Finish::Complete if reply.tool_calls.is_empty() => {
                    // An empty completion carries no answer; ask again,
                    // bounded by the turn budget.
                    if reply.text.is_empty() {
                        debug!(agent = %self.name, "empty completion, retrying");
                        continue;
                    }
                    context.push(Message::assistant(&reply.text));
                    return Ok(AgentResponse {
                        status: RunStatus::Completed,
                        final_message: reply.text,
                        context,
                    });
                }
                Finish::ContentFilter => {
                    return Ok(self.terminal_error(
                        format!("[Content Filter] {}", reply.text),
                        reply.text,
                        context,
                    ));
                }
                Finish::Truncated => {
                    return Ok(self.terminal_error(
                        format!("[Length] {}", reply.text),
                        reply.text,
                        context,
                    ));
                }
                Finish::Failed(reason) => {
                    let detail = if reply.text.is_empty() { reason } else { reply.text.clone() };
                    return Ok(self.terminal_error(
                        format!("[Failed] {detail}"),
                        reply.text,
                        context,
                    ));
                }
                // ToolCalls, or Complete with calls still pending.
                _ => {}
            }

            // Sub-agents see the conversation as it stood when the model
            // requested delegation, without this step's own tool traffic.
            let parent_context = context.clone();

            if !reply.text.is_empty() {
                context.push(Message::assistant(&reply.text));
            }
            for call in &reply.tool_calls {
                context.push(Message::ToolCall {
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }
            for call in &reply.tool_calls {
                let output = self
                    .dispatch(registry, call, &parent_context, trace, budget)
                    .await;
                context.push(Message::ToolResult {
                    call_id: call.call_id.clone(),
                    output,
                });
            }
        }
    }

    /// Resolve and invoke one model-requested call, converting every
    /// failure into a result string. Callee failures never abort the loop.
    async fn dispatch(
        &self,
        registry: &ToolRegistry,
        call: &ToolCallRequest,
        parent_context: &[Message],
        trace: &TraceSession,
        budget: &TurnBudget,
    ) -> String {
        let Some(invoker) = registry.get(&call.name) else {
            debug!(agent = %self.name, tool = %call.name, "tool not found");
            return format!("[Tool Call Error] {} - Tool not found", call.name);
        };

        trace.start(
            invoker.trace_name(),
            json!({
                "uuid": tagged_uuid("tool-call"),
                "call_id": call.call_id,
                "name": call.name,
                "arguments": call.arguments,
            }),
        );

        let outcome = self
            .invoke(invoker, call, parent_context, trace, budget)
            .await;
        let (output, status) = match outcome {
            Ok(output) => (output, "ok"),
            Err(message) => (
                format!("[Tool Call Error] {} - {message}", call.name),
                "error",
            ),
        };
        let _ = trace.end_with(json!({ "result": output, "status": status }));
        output
    }

    async fn invoke(
        &self,
        invoker: &Invoker,
        call: &ToolCallRequest,
        parent_context: &[Message],
        trace: &TraceSession,
        budget: &TurnBudget,
    ) -> Result<String, String> {
        let args: Value = if call.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.arguments)
                .map_err(|e| format!("invalid arguments: {e}"))?
        };

        match invoker {
            Invoker::Local(tool) => {
                let value = tool.invoke(args).await.map_err(|e| e.to_string())?;
                Ok(value_to_string(&value))
            }
            Invoker::Remote { server, tool } => {
                let outcome = server
                    .call_tool(tool, args)
                    .await
                    .map_err(|e| e.to_string())?;
                // Error payloads and transport errors share one channel.
                if outcome.is_error {
                    return Err(value_to_string(&outcome.content));
                }
                Ok(value_to_string(&outcome.content))
            }
            Invoker::SubAgent => {
                let name = args.get("sub_agent").and_then(Value::as_str).unwrap_or_default();
                let request = args.get("request").and_then(Value::as_str).unwrap_or_default();
                let Some(sub_agent) = self.sub_agents.iter().find(|a| a.name == name) else {
                    return Ok(format!("[Sub Agent Error] {name} - Sub Agent not found"));
                };
                let mut delegated = parent_context.to_vec();
                delegated.push(Message::user(request));
                let response = sub_agent
                    .run_with(RunInput::Context(delegated), trace, budget)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(response.final_message)
            }
        }
    }

    fn terminal_error(
        &self,
        final_message: String,
        assistant_text: String,
        mut context: Vec<Message>,
    ) -> AgentResponse {
        warn!(agent = %self.name, message = %final_message, "terminal provider outcome");
        context.push(Message::assistant(assistant_text));
        AgentResponse {
            status: RunStatus::Error,
            final_message,
            context,
        }
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!("You are an AI Agent, your purpose is to ({}).", self.purpose);
        if !self.sub_agents.is_empty() {
            let names = self
                .sub_agents
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&format!(
                " You can query the following 'sub_agents' with the 'CallSubAgent' tool: {{{names}}}"
            ));
        }
        prompt.push_str(
            " Consider using all the tools available to you to achieve this. Start acting immediately.",
        );
        prompt
    }

    /// Wrap this agent as a plain tool. Unlike delegation, a tool-wrapped
    /// agent inherits no conversation history: it sees only the literal
    /// arguments it was called with, folded into a synthetic request.
    pub fn as_tool(self: Arc<Self>, parameters: Option<ToolParameters>) -> FunctionTool {
        let name = sanitize_tool_name(&self.name);
        let parameters = parameters.unwrap_or_else(|| {
            ToolParameters::from_properties(json!({
                "request": {
                    "type": "string",
                    "description": format!("Request to send to the {name} agent"),
                },
            }))
        });
        let purpose = self.purpose.clone();
        FunctionTool::new(name, purpose, parameters, move |args| {
            let agent = Arc::clone(&self);
            async move {
                let request = format!(
                    "You were invoked as a tool with the following request - {args}"
                );
                let response = agent.run(request).await?;
                Ok(Value::String(response.final_message))
            }
        })
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools.len())
            .field("servers", &self.servers.len())
            .field("sub_agents", &self.sub_agents.len())
            .finish()
    }
}

/// Builder for [`Agent`]. Name and purpose are required; everything else
/// has defaults.
#[derive(Default)]
pub struct AgentBuilder {
    name: Option<String>,
    purpose: Option<String>,
    model: Option<String>,
    provider: Option<Arc<dyn ModelProvider>>,
    tools: Vec<Arc<dyn Tool>>,
    servers: Vec<Arc<dyn ToolServer>>,
    sub_agents: Vec<Arc<Agent>>,
    web_search: bool,
}

impl AgentBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Explicit provider handle. When absent, `build()` falls back to
    /// [`crate::config::default_provider`].
    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn server(mut self, server: Arc<dyn ToolServer>) -> Self {
        self.servers.push(server);
        self
    }

    pub fn sub_agent(mut self, agent: Arc<Agent>) -> Self {
        self.sub_agents.push(agent);
        self
    }

    /// Enable the provider's hosted web-search tool for this agent's
    /// completions. Honored by providers speaking the responses API;
    /// others ignore it.
    pub fn web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    /// Validate and build. Configuration errors are fatal and surface
    /// here, not mid-run.
    pub fn build(self) -> Result<Agent, WeftError> {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| WeftError::Configuration("Agent name is required".into()))?;
        let purpose = self
            .purpose
            .filter(|p| !p.is_empty())
            .ok_or_else(|| WeftError::Configuration("Agent purpose is required".into()))?;

        // Routing is by exact name match; duplicate siblings are ambiguous.
        let mut seen = HashSet::new();
        for sub_agent in &self.sub_agents {
            if !seen.insert(sub_agent.name.as_str()) {
                return Err(WeftError::Configuration(format!(
                    "Duplicate sub-agent name: {}",
                    sub_agent.name
                )));
            }
        }

        let provider = match self.provider {
            Some(provider) => provider,
            None => config::default_provider()?,
        };

        Ok(Agent {
            id: tagged_uuid("agent"),
            name,
            purpose,
            model: self.model.unwrap_or_else(config::default_model),
            provider,
            tools: self.tools,
            servers: self.servers,
            sub_agents: self.sub_agents,
            web_search: self.web_search,
            registry: OnceCell::new(),
        })
    }
}
