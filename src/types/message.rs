//! Canonical conversation messages.
//!
//! The format-agnostic intermediate representation of one conversation:
//! plain turns, model-requested tool calls, and their results. Both OpenAI
//! wire encodings translate into and out of this shape (see
//! [`crate::bridge`]).

use serde::{Deserialize, Serialize};

/// Conversation role for plain turns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single part of turn content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { url: String },
    File { filename: String, data: String },
}

/// One element of a canonical conversation.
///
/// A conversation is a finite ordered `Vec<Message>`. Every [`ToolResult`]
/// must reference exactly one earlier [`ToolCall`] with the same `call_id`;
/// a result that does not is an orphan and is dropped during normalization,
/// never fabricated. Call ids are unique within one conversation.
///
/// [`ToolCall`]: Message::ToolCall
/// [`ToolResult`]: Message::ToolResult
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Turn {
        role: Role,
        content: Vec<ContentPart>,
    },
    ToolCall {
        call_id: String,
        name: String,
        /// Raw JSON text, exactly as the wire carried it.
        arguments: String,
    },
    ToolResult {
        call_id: String,
        output: String,
    },
}

impl Message {
    /// Create a system turn with a single text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self::turn(Role::System, text)
    }

    /// Create a user turn with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::turn(Role::User, text)
    }

    /// Create an assistant turn with a single text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::turn(Role::Assistant, text)
    }

    fn turn(role: Role, text: impl Into<String>) -> Self {
        Self::Turn {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Concatenated text of a plain turn; empty for tool messages.
    pub fn text(&self) -> String {
        match self {
            Message::Turn { content, .. } => content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        }
    }

    /// Role of a plain turn; `None` for tool messages.
    pub fn role(&self) -> Option<Role> {
        match self {
            Message::Turn { role, .. } => Some(*role),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_build_single_text_turns() {
        let msg = Message::user("hello");
        assert_eq!(msg.role(), Some(Role::User));
        assert_eq!(msg.text(), "hello");
    }

    #[test]
    fn text_concatenates_parts_and_skips_non_text() {
        let msg = Message::Turn {
            role: Role::User,
            content: vec![
                ContentPart::Text { text: "a".into() },
                ContentPart::Image { url: "http://x/i.png".into() },
                ContentPart::Text { text: "b".into() },
            ],
        };
        assert_eq!(msg.text(), "ab");
    }

    #[test]
    fn tool_messages_have_no_role_or_text() {
        let call = Message::ToolCall {
            call_id: "call-1".into(),
            name: "lookup".into(),
            arguments: "{}".into(),
        };
        assert_eq!(call.role(), None);
        assert_eq!(call.text(), "");
    }

    #[test]
    fn serde_round_trip() {
        let msg = Message::ToolResult {
            call_id: "call-9".into(),
            output: "42".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
