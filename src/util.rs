//! Small shared helpers: prefixed ids, name sanitation, result rendering.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Prefixed v4 id, e.g. `agent-6f9e…`. The prefix is lowercased and reduced
/// to `[a-z0-9-]` so ids stay greppable in traces.
pub fn tagged_uuid(tag: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    let strip = STRIP.get_or_init(|| Regex::new(r"[^a-zA-Z0-9-]+").expect("valid regex"));
    let tag = strip.replace_all(tag, "").to_lowercase();
    format!("{}-{}", tag.trim_matches('-'), uuid::Uuid::new_v4())
}

/// Strip characters providers reject in tool names.
pub fn sanitize_tool_name(name: &str) -> String {
    static KEEP: OnceLock<Regex> = OnceLock::new();
    let keep = KEEP.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]+").expect("valid regex"));
    keep.replace_all(name, "").into_owned()
}

/// Render a tool return value as the string fed back to the model.
///
/// Strings pass through unquoted; everything else is serialized JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
