//! Conversation bridge between the two OpenAI wire encodings and the
//! canonical IR.
//!
//! Format A ("completions") is turn-oriented: tool calls ride on the
//! preceding assistant message as a `tool_calls` batch, results are
//! `role: "tool"` messages. Format B ("responses") is event-oriented:
//! every tool call and result is its own top-level `function_call` /
//! `function_call_output` item. [`normalize`] accepts either shape;
//! [`to_completions`] and [`to_responses`] emit them from the IR.
//!
//! Anything the IR cannot represent is dropped deterministically: unknown
//! content-part types vanish, and a tool result whose call id was never
//! seen as a call is an orphan and is discarded (a policy, not an error).

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::types::{ContentPart, Message, Role};

/// Translate a wire message array (either format) into the canonical IR.
pub fn normalize(wire: &[Value]) -> Vec<Message> {
    let mut out = Vec::new();
    let mut seen_calls: HashSet<String> = HashSet::new();

    for msg in wire {
        if let Some(role) = msg.get("role").and_then(Value::as_str) {
            let content = msg.get("content").filter(|c| !c.is_null());
            if let Some(content) = content {
                let parts = normalize_content(role, content);
                if role == "tool" {
                    // Format A tool result: text payload keyed by tool_call_id.
                    let Some(call_id) = msg.get("tool_call_id").and_then(Value::as_str) else {
                        continue;
                    };
                    if !seen_calls.contains(call_id) {
                        continue; // orphan-drop
                    }
                    let output = parts
                        .iter()
                        .filter_map(|p| match p {
                            ContentPart::Text { text } => Some(text.as_str()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("");
                    out.push(Message::ToolResult {
                        call_id: call_id.to_string(),
                        output,
                    });
                    continue;
                }
                if let Some(role) = parse_role(role) {
                    out.push(Message::Turn { role, content: parts });
                }
            }
            // Format A: an assistant message may carry a tool_calls batch
            // alongside (or instead of) content.
            if let Some(calls) = msg.get("tool_calls").and_then(Value::as_array) {
                for call in calls {
                    let Some(id) = call.get("id").and_then(Value::as_str) else {
                        continue;
                    };
                    let function = call.get("function").cloned().unwrap_or(Value::Null);
                    seen_calls.insert(id.to_string());
                    out.push(Message::ToolCall {
                        call_id: id.to_string(),
                        name: str_field(&function, "name"),
                        arguments: str_field(&function, "arguments"),
                    });
                }
            }
            continue;
        }

        match msg.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                let Some(call_id) = msg.get("call_id").and_then(Value::as_str) else {
                    continue;
                };
                seen_calls.insert(call_id.to_string());
                out.push(Message::ToolCall {
                    call_id: call_id.to_string(),
                    name: str_field(msg, "name"),
                    arguments: str_field(msg, "arguments"),
                });
            }
            Some("function_call_output") => {
                let Some(call_id) = msg.get("call_id").and_then(Value::as_str) else {
                    continue;
                };
                if !seen_calls.contains(call_id) {
                    continue; // orphan-drop
                }
                out.push(Message::ToolResult {
                    call_id: call_id.to_string(),
                    output: str_field(msg, "output"),
                });
            }
            _ => {}
        }
    }

    out
}

/// Emit Format A (turn-oriented). Consecutive tool calls are buffered and
/// flushed as one assistant message with a `tool_calls` batch, in original
/// order, whenever a non-tool-call message follows or the sequence ends.
pub fn to_completions(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::new();
    let mut pending: Vec<Value> = Vec::new();

    fn flush(out: &mut Vec<Value>, pending: &mut Vec<Value>) {
        if !pending.is_empty() {
            out.push(json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": std::mem::take(pending),
            }));
        }
    }

    for msg in messages {
        match msg {
            Message::Turn { role, content } => {
                flush(&mut out, &mut pending);
                let parts: Vec<Value> = content.iter().map(part_to_completions).collect();
                out.push(json!({ "role": role.as_str(), "content": parts }));
            }
            Message::ToolCall {
                call_id,
                name,
                arguments,
            } => {
                pending.push(json!({
                    "id": call_id,
                    "type": "function",
                    "function": { "name": name, "arguments": arguments },
                }));
            }
            Message::ToolResult { call_id, output } => {
                flush(&mut out, &mut pending);
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": [{ "type": "text", "text": output }],
                }));
            }
        }
    }

    flush(&mut out, &mut pending);
    out
}

/// Emit Format B (event-oriented). Tool results are filtered against the
/// call ids emitted in this same output, re-applying the orphan-drop policy
/// independently of normalization.
pub fn to_responses(messages: &[Message]) -> Vec<Value> {
    let emitted_calls: HashSet<&str> = messages
        .iter()
        .filter_map(|m| match m {
            Message::ToolCall { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();

    messages
        .iter()
        .filter_map(|msg| match msg {
            Message::Turn { role, content } => {
                let parts: Vec<Value> = content
                    .iter()
                    .map(|part| part_to_responses(*role, part))
                    .collect();
                Some(json!({ "role": role.as_str(), "content": parts }))
            }
            Message::ToolCall {
                call_id,
                name,
                arguments,
            } => Some(json!({
                "type": "function_call",
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
            })),
            Message::ToolResult { call_id, output } => {
                if !emitted_calls.contains(call_id.as_str()) {
                    return None;
                }
                Some(json!({
                    "type": "function_call_output",
                    "call_id": call_id,
                    "output": output,
                }))
            }
        })
        .collect()
}

fn parse_role(role: &str) -> Option<Role> {
    match role {
        "system" => Some(Role::System),
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn normalize_content(role: &str, content: &Value) -> Vec<ContentPart> {
    if let Some(text) = content.as_str() {
        return vec![ContentPart::Text { text: text.to_string() }];
    }
    let Some(parts) = content.as_array() else {
        return Vec::new();
    };

    parts
        .iter()
        .filter_map(|part| {
            // Assistant-produced text defaults to output text, everything
            // else to input text, when a part omits its type tag.
            let default_type = if role == "assistant" { "output_text" } else { "input_text" };
            let part_type = part
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or(default_type);

            match part_type {
                "text" | "input_text" | "output_text" => {
                    let text = part
                        .get("text")
                        .and_then(Value::as_str)
                        .or_else(|| part.as_str())
                        .unwrap_or_default();
                    Some(ContentPart::Text { text: text.to_string() })
                }
                "image_url" | "input_image" => {
                    let image = part.get("image_url")?;
                    let url = image
                        .get("url")
                        .and_then(Value::as_str)
                        .or_else(|| image.as_str())?;
                    Some(ContentPart::Image { url: url.to_string() })
                }
                "file" | "input_file" => {
                    let nested = part.get("file");
                    let filename = nested
                        .and_then(|f| f.get("filename"))
                        .or_else(|| part.get("filename"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let data = nested
                        .and_then(|f| f.get("file_data"))
                        .or_else(|| part.get("file_data"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    Some(ContentPart::File {
                        filename: filename.to_string(),
                        data: data.to_string(),
                    })
                }
                // Unknown part types are dropped, not erred.
                _ => None,
            }
        })
        .collect()
}

fn part_to_completions(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({ "type": "text", "text": text }),
        ContentPart::Image { url } => json!({ "type": "image_url", "image_url": { "url": url } }),
        ContentPart::File { filename, data } => json!({
            "type": "file",
            "file": { "filename": filename, "file_data": data },
        }),
    }
}

fn part_to_responses(role: Role, part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => {
            let part_type = if role == Role::Assistant { "output_text" } else { "input_text" };
            json!({ "type": part_type, "text": text })
        }
        ContentPart::Image { url } => json!({ "type": "input_image", "image_url": url }),
        ContentPart::File { filename, data } => json!({
            "type": "input_file",
            "filename": filename,
            "file_data": data,
        }),
    }
}
