//! Run supervision: per-run trace capture and the shared turn budget.
//!
//! [`Agent::run`] discards its trace; wrap the run in a [`Runner`] when the
//! caller wants the execution tree back alongside the response.

use std::sync::Arc;

use serde_json::json;

use crate::agent::{Agent, AgentResponse, RunInput, TurnBudget, DEFAULT_MAX_TURNS};
use crate::error::WeftError;
use crate::trace::{TraceNode, TraceSession};

/// One run's response together with its captured trace tree.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub response: AgentResponse,
    pub trace: TraceNode,
}

impl RunReport {
    /// Box-drawing rendering of the trace, one line per node.
    pub fn render(&self) -> String {
        self.trace.render()
    }
}

/// Supervises runs of one root agent. Holds no per-run state; each call to
/// [`Runner::run`] gets a fresh trace session and turn budget.
#[derive(Debug, Clone)]
pub struct Runner {
    agent: Arc<Agent>,
    name: Option<String>,
    max_turns: usize,
}

impl Runner {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent, name: None, max_turns: DEFAULT_MAX_TURNS }
    }

    /// Label recorded on the root trace span; defaults to the agent name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the turn ceiling for runs started by this runner.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Drive the root agent to a terminal state, wrapping the whole run in
    /// a root trace span shared with every delegated sub-agent.
    pub async fn run(&self, input: impl Into<RunInput>) -> Result<RunReport, WeftError> {
        let trace = TraceSession::new();
        let budget = TurnBudget::new(self.max_turns);

        let label = self.name.as_deref().unwrap_or_else(|| self.agent.name());
        trace.start("runner.run", json!({ "name": label, "agent": self.agent.name() }));
        let result = self.agent.run_with(input.into(), &trace, &budget).await;
        let _ = trace.end_with(json!({ "turns": budget.used() }));

        let response = result?;
        let tree = trace
            .tree()
            .ok_or_else(|| WeftError::Trace("run produced no trace".into()))?;
        Ok(RunReport { response, trace: tree })
    }
}
