//! Wire-level tests for the OpenAI provider against a mock HTTP server.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weft::error::WeftError;
use weft::provider::openai::{Api, OpenAiProvider};
use weft::provider::{CompletionRequest, Finish, ModelProvider, ToolSpec};
use weft::types::Message;

fn request<'a>(context: &'a [Message], tools: &'a [ToolSpec]) -> CompletionRequest<'a> {
    CompletionRequest {
        model: "gpt-4o",
        system: "You are a test fixture.",
        context,
        tools,
        web_search: false,
    }
}

fn lookup_tool() -> ToolSpec {
    ToolSpec {
        name: "lookup".into(),
        description: "Look things up".into(),
        parameters: json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"],
            "additionalProperties": false,
        }),
    }
}

#[tokio::test]
async fn completions_happy_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains("\"model\":\"gpt-4o\""))
        .and(body_string_contains("You are a test fixture."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": "All good." }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()), Api::Completions);
    let context = [Message::user("ping")];
    let reply = provider.complete(request(&context, &[])).await.unwrap();
    assert_eq!(reply.finish, Finish::Complete);
    assert_eq!(reply.text, "All good.");
    assert!(reply.tool_calls.is_empty());
}

#[tokio::test]
async fn completions_encodes_tools_and_parses_tool_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("\"type\":\"function\""))
        .and(body_string_contains("\"strict\":true"))
        .and(body_string_contains("\"name\":\"lookup\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call-abc",
                        "type": "function",
                        "function": {
                            "name": "lookup",
                            "arguments": "{\"query\":\"rust\"}"
                        }
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()), Api::Completions);
    let context = [Message::user("find rust")];
    let tools = [lookup_tool()];
    let reply = provider.complete(request(&context, &tools)).await.unwrap();
    assert_eq!(reply.finish, Finish::ToolCalls);
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].call_id, "call-abc");
    assert_eq!(reply.tool_calls[0].name, "lookup");
    assert_eq!(reply.tool_calls[0].arguments, "{\"query\":\"rust\"}");
}

#[tokio::test]
async fn completions_sends_bridged_tool_history() {
    let server = MockServer::start().await;

    // A prior call/result pair must go out as an assistant tool_calls
    // message followed by a role "tool" message.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("\"tool_call_id\":\"call-1\""))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": "done" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()), Api::Completions);
    let context = [
        Message::user("look it up"),
        Message::ToolCall {
            call_id: "call-1".into(),
            name: "lookup".into(),
            arguments: "{}".into(),
        },
        Message::ToolResult {
            call_id: "call-1".into(),
            output: "found it".into(),
        },
    ];
    provider.complete(request(&context, &[])).await.unwrap();
}

#[tokio::test]
async fn responses_happy_path_with_function_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains("\"input\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "output": [
                {
                    "type": "function_call",
                    "call_id": "call-xyz",
                    "name": "lookup",
                    "arguments": "{\"query\":\"weather\"}"
                },
                {
                    "type": "message",
                    "content": [
                        { "type": "output_text", "text": "Checking the weather." }
                    ]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()), Api::Responses);
    let context = [Message::user("weather?")];
    let tools = [lookup_tool()];
    let reply = provider.complete(request(&context, &tools)).await.unwrap();
    assert_eq!(reply.finish, Finish::ToolCalls);
    assert_eq!(reply.text, "Checking the weather.");
    assert_eq!(reply.tool_calls[0].call_id, "call-xyz");
    assert_eq!(reply.tool_calls[0].name, "lookup");
}

#[tokio::test]
async fn responses_request_carries_web_search_tool() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_string_contains("\"type\":\"web_search\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "output": [
                {
                    "type": "message",
                    "content": [{ "type": "output_text", "text": "found" }]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()), Api::Responses);
    let context = [Message::user("search the web")];
    let reply = provider
        .complete(CompletionRequest {
            model: "gpt-4o",
            system: "You are a test fixture.",
            context: &context,
            tools: &[],
            web_search: true,
        })
        .await
        .unwrap();
    assert_eq!(reply.text, "found");
}

#[tokio::test]
async fn responses_truncation_maps_to_truncated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "incomplete",
            "incomplete_details": { "reason": "max_output_tokens" },
            "output": [
                {
                    "type": "message",
                    "content": [{ "type": "output_text", "text": "partial" }]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()), Api::Responses);
    let context = [Message::user("write a lot")];
    let reply = provider.complete(request(&context, &[])).await.unwrap();
    assert_eq!(reply.finish, Finish::Truncated);
    assert_eq!(reply.text, "partial");
}

#[tokio::test]
async fn unauthorized_maps_to_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid API key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("bad-key".into(), Some(server.uri()), Api::Completions);
    let context = [Message::user("hello")];
    let err = provider.complete(request(&context, &[])).await.unwrap_err();
    assert!(matches!(err, WeftError::Authentication(_)));
    assert!(err.to_string().contains("Invalid API key"));
}

#[tokio::test]
async fn server_error_maps_to_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()), Api::Completions);
    let context = [Message::user("hello")];
    let err = provider.complete(request(&context, &[])).await.unwrap_err();
    match err {
        WeftError::Provider { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("status 500"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
