//! Hierarchical trace recorder.
//!
//! One [`TraceSession`] records the nested, timed spans of a single run:
//! [`start`](TraceSession::start) opens a child of the currently open node
//! and descends into it, [`end`](TraceSession::end) seals the top of the
//! stack. A node without an end timestamp marks a still-running or
//! abandoned operation; that is a diagnostic signal, not an error. The rendered
//! tree is a debugging view; the runtime never consumes it.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WeftError;
use crate::util::tagged_uuid;

/// Owned snapshot of one recorded span and its children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceNode {
    pub id: String,
    pub name: String,
    pub payload: Value,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub children: Vec<TraceNode>,
}

impl TraceNode {
    /// Elapsed milliseconds, if the span is sealed.
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Render this node and its subtree with box-drawing connectors.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_into(self, "", None, &mut out);
        out
    }
}

fn render_into(node: &TraceNode, prefix: &str, last: Option<bool>, out: &mut String) {
    let connector = match last {
        None => "",
        Some(false) => "├─ ",
        Some(true) => "└─ ",
    };
    out.push_str(prefix);
    out.push_str(connector);
    out.push_str(&node.name);
    out.push_str(&format!(" [{}]", node.id));
    match node.elapsed_ms() {
        Some(ms) => out.push_str(&format!(" ({ms} ms)")),
        None => out.push_str(" (open)"),
    }
    if !node.payload.is_null() {
        if let Some(obj) = node.payload.as_object() {
            if !obj.is_empty() {
                out.push_str(&format!(" {}", node.payload));
            }
        } else {
            out.push_str(&format!(" {}", node.payload));
        }
    }
    out.push('\n');

    let child_prefix = match last {
        None => String::new(),
        Some(false) => format!("{prefix}│  "),
        Some(true) => format!("{prefix}   "),
    };
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        render_into(child, &child_prefix, Some(i + 1 == count), out);
    }
}

struct ArenaNode {
    id: String,
    name: String,
    payload: Value,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    children: Vec<usize>,
}

#[derive(Default)]
struct Inner {
    nodes: Vec<ArenaNode>,
    roots: Vec<usize>,
    stack: Vec<usize>,
}

/// Append-only trace tree, mutable during recording.
///
/// Interior mutability lets the runtime thread one `&TraceSession` through
/// an entire run, sub-agent delegation included. Critical sections are
/// short; no await happens under the lock.
#[derive(Default)]
pub struct TraceSession {
    inner: Mutex<Inner>,
}

impl TraceSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new span as a child of the currently open node (or as a root
    /// when nothing is open) and descend into it. Returns the span id.
    pub fn start(&self, name: impl Into<String>, payload: Value) -> String {
        let mut inner = self.inner.lock().expect("trace lock poisoned");
        let id = tagged_uuid("trace-node");
        let index = inner.nodes.len();
        inner.nodes.push(ArenaNode {
            id: id.clone(),
            name: name.into(),
            payload,
            started_at: Utc::now(),
            ended_at: None,
            children: Vec::new(),
        });
        match inner.stack.last().copied() {
            Some(parent) => inner.nodes[parent].children.push(index),
            None => inner.roots.push(index),
        }
        inner.stack.push(index);
        id
    }

    /// Seal the top-of-stack span and pop it. Returns elapsed milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::Trace`] when nothing is open (caller/stack
    /// mismatch).
    pub fn end(&self) -> Result<i64, WeftError> {
        self.end_with(Value::Null)
    }

    /// Like [`end`](Self::end), but first merges `extra` into the span's
    /// payload. Used to attach results and statuses captured after the
    /// span was opened.
    pub fn end_with(&self, extra: Value) -> Result<i64, WeftError> {
        let mut inner = self.inner.lock().expect("trace lock poisoned");
        let Some(index) = inner.stack.pop() else {
            return Err(WeftError::Trace("no active trace node to end".into()));
        };
        let node = &mut inner.nodes[index];
        merge_payload(&mut node.payload, extra);
        let end = Utc::now();
        node.ended_at = Some(end);
        Ok((end - node.started_at).num_milliseconds())
    }

    /// Owned snapshot of the first recorded root, if any.
    pub fn tree(&self) -> Option<TraceNode> {
        let inner = self.inner.lock().expect("trace lock poisoned");
        inner.roots.first().map(|&root| snapshot(&inner, root))
    }

    /// Render every recorded root depth-first.
    pub fn render(&self) -> String {
        let inner = self.inner.lock().expect("trace lock poisoned");
        let mut out = String::new();
        for &root in &inner.roots {
            let node = snapshot(&inner, root);
            out.push_str(&node.render());
        }
        out
    }
}

fn snapshot(inner: &Inner, index: usize) -> TraceNode {
    let node = &inner.nodes[index];
    TraceNode {
        id: node.id.clone(),
        name: node.name.clone(),
        payload: node.payload.clone(),
        started_at: node.started_at,
        ended_at: node.ended_at,
        children: node
            .children
            .iter()
            .map(|&child| snapshot(inner, child))
            .collect(),
    }
}

fn merge_payload(payload: &mut Value, extra: Value) {
    if extra.is_null() {
        return;
    }
    match (payload.as_object_mut(), extra) {
        (Some(base), Value::Object(extra)) => {
            for (k, v) in extra {
                base.insert(k, v);
            }
        }
        (_, extra) => {
            if payload.is_null() {
                *payload = extra;
            }
        }
    }
}
