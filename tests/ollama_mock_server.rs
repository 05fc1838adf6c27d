use std::sync::Arc;
use std::time::Duration;

use chat_curator::{ChatMessage, ChatModel, ModelError, OllamaClient, ProviderConfig, Responder};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_ollama_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "mistral",
        "created_at": "2024-06-01T08:00:00Z",
        "message": {"role": "assistant", "content": text},
        "done": true
    })
}

fn client_for(server: &MockServer, timeout: Duration) -> OllamaClient {
    OllamaClient::with_provider(ProviderConfig::new(server.uri(), timeout)).unwrap()
}

#[tokio::test]
async fn ollama_basic_chat_sends_non_streaming_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": "mistral",
            "stream": false,
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_ollama_response("Hello!")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let text = client
        .complete("mistral", vec![ChatMessage::user("hi")])
        .await
        .unwrap();

    assert_eq!(text, "Hello!");
}

#[tokio::test]
async fn responder_injects_context_as_system_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                {"role": "system", "content": "Earlier answer:\n\nParis"},
                {"role": "user", "content": "capital of france"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_ollama_response("Paris.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let responder = Responder::new(Arc::new(client), "mistral").with_context_label("Earlier answer:");

    let text = responder
        .generate("capital of france", Some("Paris"))
        .await
        .unwrap();
    assert_eq!(text, "Paris.");
}

#[tokio::test]
async fn ollama_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"error": "model 'nope' not found"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client
        .complete("nope", vec![ChatMessage::user("hi")])
        .await
        .unwrap_err();

    match err {
        ModelError::Status { status, body } => {
            assert_eq!(status.as_u16(), 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn ollama_missing_content_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client
        .complete("mistral", vec![ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Decode(_)));
}

#[tokio::test]
async fn ollama_slow_reply_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mock_ollama_response("too late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_millis(200));
    let err = client
        .complete("mistral", vec![ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Timeout(_)), "got {err:?}");
}
