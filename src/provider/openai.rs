//! OpenAI provider speaking either wire API.
//!
//! The same provider can post the turn-oriented Chat Completions shape or
//! the event-oriented Responses shape; the conversation bridge produces
//! whichever encoding the selected API expects.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::bridge;
use crate::error::WeftError;

use super::{CompletionRequest, Finish, ModelProvider, ModelReply, ToolCallRequest, ToolSpec};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Which OpenAI wire API to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Api {
    Completions,
    #[default]
    Responses,
}

pub struct OpenAiProvider {
    api: Api,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>, api: Api) -> Self {
        Self {
            api,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn completions_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        messages.extend(bridge::to_completions(request.context));

        let mut body = json!({ "model": request.model, "messages": messages });
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                            "strict": true,
                        },
                    })
                })
                .collect();
            body["tools"] = tools.into();
        }
        body
    }

    fn responses_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut input = vec![json!({ "role": "system", "content": request.system })];
        input.extend(bridge::to_responses(request.context));

        let mut body = json!({ "model": request.model, "input": input });
        let mut tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                    "strict": true,
                })
            })
            .collect();
        // Hosted web search is a built-in tool on this API; the chat
        // completions API has no equivalent and ignores the flag.
        if request.web_search {
            tools.push(json!({ "type": "web_search" }));
        }
        if !tools.is_empty() {
            body["tools"] = tools.into();
        }
        body
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, WeftError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            if status == 401 || status == 403 {
                return Err(WeftError::Authentication(body_text));
            }
            return Err(WeftError::Provider {
                provider: "openai".into(),
                message: format!("status {status}: {body_text}"),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply, WeftError> {
        match self.api {
            Api::Completions => {
                debug!(model = request.model, "OpenAI chat completions request");
                if request.web_search {
                    warn!("web search requested; only the responses API supports it");
                }
                let body = self.completions_body(&request);
                let resp = self.post("/chat/completions", &body).await?;
                let data: ChatResponse = resp.json().await?;
                parse_chat_response(data)
            }
            Api::Responses => {
                debug!(model = request.model, "OpenAI responses request");
                let body = self.responses_body(&request);
                let resp = self.post("/responses", &body).await?;
                let data: ResponsesResponse = resp.json().await?;
                parse_responses_response(data)
            }
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    finish_reason: Option<String>,
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Deserialize)]
struct ChatFunction {
    name: String,
    arguments: String,
}

fn parse_chat_response(data: ChatResponse) -> Result<ModelReply, WeftError> {
    let choice = data.choices.into_iter().next().ok_or_else(|| WeftError::Provider {
        provider: "openai".into(),
        message: "no choices in response".into(),
    })?;

    let text = choice.message.content.unwrap_or_default();
    let tool_calls: Vec<ToolCallRequest> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallRequest {
            call_id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let finish = match choice.finish_reason.as_deref() {
        _ if !tool_calls.is_empty() => Finish::ToolCalls,
        Some("stop") | None => Finish::Complete,
        Some("content_filter") => Finish::ContentFilter,
        Some("length") => Finish::Truncated,
        Some(other) => Finish::Failed(other.to_string()),
    };

    Ok(ModelReply { finish, text, tool_calls })
}

#[derive(Deserialize)]
struct ResponsesResponse {
    status: Option<String>,
    #[serde(default)]
    output: Vec<Value>,
    error: Option<ResponsesError>,
    incomplete_details: Option<IncompleteDetails>,
}

#[derive(Deserialize)]
struct ResponsesError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct IncompleteDetails {
    reason: Option<String>,
}

fn parse_responses_response(data: ResponsesResponse) -> Result<ModelReply, WeftError> {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for item in &data.output {
        match item.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                tool_calls.push(ToolCallRequest {
                    call_id: item
                        .get("call_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: item
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: item
                        .get("arguments")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            Some("message") => {
                if let Some(parts) = item.get("content").and_then(Value::as_array) {
                    for part in parts {
                        if part.get("type").and_then(Value::as_str) == Some("output_text") {
                            if let Some(t) = part.get("text").and_then(Value::as_str) {
                                text.push_str(t);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    let finish = match data.status.as_deref() {
        _ if !tool_calls.is_empty() => Finish::ToolCalls,
        Some("completed") | None => Finish::Complete,
        Some("failed") => Finish::Failed(
            data.error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "provider reported failure".into()),
        ),
        Some("incomplete") => {
            let reason = data
                .incomplete_details
                .and_then(|d| d.reason)
                .unwrap_or_default();
            match reason.as_str() {
                "max_output_tokens" => Finish::Truncated,
                "content_filter" => Finish::ContentFilter,
                other => Finish::Failed(other.to_string()),
            }
        }
        Some(other) => Finish::Failed(other.to_string()),
    };

    Ok(ModelReply { finish, text, tool_calls })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_finish_maps_tool_calls_over_stop() {
        let data = ChatResponse {
            choices: vec![ChatChoice {
                finish_reason: Some("tool_calls".into()),
                message: ChatMessage {
                    content: None,
                    tool_calls: Some(vec![ChatToolCall {
                        id: "c1".into(),
                        function: ChatFunction { name: "f".into(), arguments: "{}".into() },
                    }]),
                },
            }],
        };
        let reply = parse_chat_response(data).unwrap();
        assert_eq!(reply.finish, Finish::ToolCalls);
        assert_eq!(reply.tool_calls[0].call_id, "c1");
    }

    #[test]
    fn chat_finish_maps_length_and_filter() {
        for (reason, expected) in [
            ("length", Finish::Truncated),
            ("content_filter", Finish::ContentFilter),
        ] {
            let data = ChatResponse {
                choices: vec![ChatChoice {
                    finish_reason: Some(reason.into()),
                    message: ChatMessage { content: Some("partial".into()), tool_calls: None },
                }],
            };
            let reply = parse_chat_response(data).unwrap();
            assert_eq!(reply.finish, expected);
            assert_eq!(reply.text, "partial");
        }
    }

    #[test]
    fn responses_output_collects_text_and_calls() {
        let data = ResponsesResponse {
            status: Some("completed".into()),
            output: vec![
                json!({
                    "type": "message",
                    "content": [{ "type": "output_text", "text": "hi" }],
                }),
                json!({ "type": "function_call", "call_id": "c2", "name": "g", "arguments": "{\"a\":1}" }),
            ],
            error: None,
            incomplete_details: None,
        };
        let reply = parse_responses_response(data).unwrap();
        assert_eq!(reply.finish, Finish::ToolCalls);
        assert_eq!(reply.text, "hi");
        assert_eq!(reply.tool_calls[0].arguments, "{\"a\":1}");
    }

    #[test]
    fn responses_incomplete_maps_reason() {
        let data = ResponsesResponse {
            status: Some("incomplete".into()),
            output: vec![],
            error: None,
            incomplete_details: Some(IncompleteDetails { reason: Some("max_output_tokens".into()) }),
        };
        let reply = parse_responses_response(data).unwrap();
        assert_eq!(reply.finish, Finish::Truncated);
    }

    #[test]
    fn tools_are_shaped_per_api() {
        let provider = OpenAiProvider::new("sk-test".into(), None, Api::Completions);
        let specs = [ToolSpec {
            name: "lookup".into(),
            description: "Look things up".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        }];
        let request = CompletionRequest {
            model: "gpt-4o",
            system: "sys",
            context: &[],
            tools: &specs,
            web_search: false,
        };
        let body = provider.completions_body(&request);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");

        let body = provider.responses_body(&request);
        assert_eq!(body["tools"][0]["name"], "lookup");
        assert_eq!(body["input"][0]["role"], "system");
    }

    #[test]
    fn web_search_is_a_responses_builtin_tool_only() {
        let provider = OpenAiProvider::new("sk-test".into(), None, Api::Responses);
        let request = CompletionRequest {
            model: "gpt-4o",
            system: "sys",
            context: &[],
            tools: &[],
            web_search: true,
        };
        let body = provider.responses_body(&request);
        assert_eq!(body["tools"][0]["type"], "web_search");

        let body = provider.completions_body(&request);
        assert!(body.get("tools").is_none());
    }
}
