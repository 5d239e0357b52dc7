//! End-to-end tests against a local mock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatline::{ChatClient, ChatConfig, ChatModel, ChatOptions, ClientError, FinishReason, Prompt};

const CHAT_PATH: &str = "/v1/chat/completions";

fn config(server: &MockServer) -> ChatConfig {
    ChatConfig::new("test", server.uri(), CHAT_PATH, "gpt-test")
        .with_api_key("sk-test")
        .with_retry(2, Duration::from_millis(10))
}

fn chat_completion() -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "gpt-test",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "Hello! How can I help you today?" },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21 }
    })
}

#[tokio::test]
async fn test_call_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("Authorization", "Bearer sk-test"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({ "model": "gpt-test" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion()))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(config(&server)).unwrap();
    let response = client
        .call(Prompt::user("Hello"), ChatOptions::new())
        .await
        .unwrap();

    assert_eq!(response.content(), "Hello! How can I help you today?");
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 9);
    assert_eq!(usage.total_tokens, 21);
}

#[tokio::test]
async fn test_provider_error_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(config(&server)).unwrap();
    let err = client
        .call(Prompt::user("Hello"), ChatOptions::new())
        .await
        .unwrap_err();

    match &err {
        ClientError::Provider {
            message, status, ..
        } => {
            assert_eq!(message, "Incorrect API key provided");
            assert_eq!(*status, Some(401));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_server_errors_are_retried_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion()))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(config(&server)).unwrap();
    let response = client
        .call(Prompt::user("Hello"), ChatOptions::new())
        .await
        .unwrap();

    assert_eq!(response.content(), "Hello! How can I help you today?");
}

#[tokio::test]
async fn test_stream_over_http() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2,\"total_tokens\":6}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({
            "stream": true,
            "stream_options": { "include_usage": true }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(config(&server)).unwrap();
    let mut deltas = Vec::new();
    let message = client
        .stream(
            Prompt::user("Hello"),
            |delta| deltas.push(delta.to_string()),
            ChatOptions::new().with_include_usage(true),
        )
        .await
        .unwrap();

    assert_eq!(deltas, ["Hel", "lo"]);
    assert_eq!(message.text(), "Hello");
    assert_eq!(message.finish_reason, Some(FinishReason::Stop));
    assert_eq!(message.usage.map(|u| u.total_tokens), Some(6));
}

#[tokio::test]
async fn test_stream_error_frame_over_http() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"par\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"model overloaded\",\"type\":\"server_error\"}}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"tial\"}}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let client = ChatClient::new(config(&server)).unwrap();
    let mut deltas = Vec::new();
    let err = client
        .stream(
            Prompt::user("Hello"),
            |delta| deltas.push(delta.to_string()),
            ChatOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(deltas, ["par"]);
    assert!(matches!(err, ClientError::Provider { ref message, .. } if message == "model overloaded"));
}
