//! OpenAI-compatible backend against a mock HTTP server.

#![cfg(feature = "openai")]

use pocket_core::{Error, GenerationBackend};
use pocket_inference::openai::{OpenAIBackend, OpenAIConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer, api_key: Option<&str>) -> OpenAIBackend {
    OpenAIBackend::new(OpenAIConfig {
        base_url: server.uri(),
        api_key: api_key.map(str::to_string),
        gen_model: "test-gen".to_string(),
        ..Default::default()
    })
    .expect("Failed to create backend")
}

#[tokio::test]
async fn test_chat_completion_with_bearer_and_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-gen",
            "max_tokens": 200,
            "response_format": {"type": "json_schema"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": " {\"category\":\"Work\"} "},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = backend(&server, Some("test-key"))
        .generate("hello", None)
        .await
        .unwrap();
    assert_eq!(reply.text, "{\"category\":\"Work\"}");
    assert!(!reply.is_truncated());
}

#[tokio::test]
async fn test_length_finish_reason_is_truncated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "{\"cat"},
                "finish_reason": "length"
            }]
        })))
        .mount(&server)
        .await;

    let reply = backend(&server, None).generate("hello", None).await.unwrap();
    assert!(reply.is_truncated());
}

#[tokio::test]
async fn test_error_body_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "rate_limit_exceeded"}
        })))
        .mount(&server)
        .await;

    let err = backend(&server, None).generate("hello", None).await.unwrap_err();
    match err {
        Error::Inference(msg) => assert!(msg.contains("Rate limit reached")),
        other => panic!("Expected Inference error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health_check_unreachable_is_false() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(!backend(&server, None).health_check().await.unwrap());
}
