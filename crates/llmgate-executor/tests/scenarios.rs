//! End-to-end retry/rotation behavior against a local mock HTTP server,
//! exercising the Request Executor and Credential Store together the way a
//! real adapter + transport would drive them.

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tokio_util::sync::CancellationToken;

use llmgate_adapter::ProviderConfig;
use llmgate_adapter::providers::OpenAiAdapter;
use llmgate_credential::CredentialStore;
use llmgate_executor::{ExecutorConfig, RequestExecutor};
use llmgate_transport::{Transport, TransportConfig};
use llmgate_types::{ErrorKind, LLMRequest, Message};

fn executor() -> RequestExecutor {
    RequestExecutor::new(
        Transport::new(TransportConfig::default()),
        ExecutorConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter: 0.0,
        },
    )
}

#[tokio::test]
async fn key_rotation_on_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer key-a"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": { "message": "rate limited" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer key-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "hello" }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new();
    let credential_store = CredentialStore::with_credentials(
        "openai",
        vec![(1, "key-a".to_string()), (2, "key-b".to_string())],
    );
    let provider_cfg = ProviderConfig {
        api_base: Some(server.uri()),
        ..Default::default()
    };

    let response = executor()
        .execute(
            &adapter,
            &credential_store,
            &provider_cfg,
            "gpt-4o",
            &LLMRequest::new(vec![Message::user("hi")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.text, "hello");

    let stats = credential_store.stats().await;
    let a = stats.iter().find(|s| s.id == 1).unwrap();
    let b = stats.iter().find(|s| s.id == 2).unwrap();
    assert_eq!(a.state_label, "cooling");
    assert_eq!(b.consecutive_failures, 0);
}

#[tokio::test]
async fn auth_error_disables_credential_and_retry_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer key-x"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "invalid api key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer key-y"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new();
    let credential_store = CredentialStore::with_credentials(
        "openai",
        vec![(1, "key-x".to_string()), (2, "key-y".to_string())],
    );
    let provider_cfg = ProviderConfig {
        api_base: Some(server.uri()),
        ..Default::default()
    };

    let response = executor()
        .execute(
            &adapter,
            &credential_store,
            &provider_cfg,
            "gpt-4o",
            &LLMRequest::new(vec![Message::user("hi")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.text, "ok");

    let stats = credential_store.stats().await;
    let x = stats.iter().find(|s| s.id == 1).unwrap();
    assert_eq!(x.state_label, "disabled");

    // Credential 1 stays disabled across a fresh round of acquisitions: every
    // subsequent successful request keeps landing on credential 2 alone.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer key-y"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "still ok" }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let second = executor()
        .execute(
            &adapter,
            &credential_store,
            &provider_cfg,
            "gpt-4o",
            &LLMRequest::new(vec![Message::user("hi again")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(second.text, "still ok");
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "message": "invalid request" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new();
    let credential_store = CredentialStore::with_credentials("openai", vec![(1, "key".to_string())]);
    let provider_cfg = ProviderConfig {
        api_base: Some(server.uri()),
        ..Default::default()
    };

    let err = executor()
        .execute(
            &adapter,
            &credential_store,
            &provider_cfg,
            "gpt-4o",
            &LLMRequest::new(vec![Message::user("hi")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
}

#[tokio::test]
async fn canceled_token_aborts_before_any_request_is_sent() {
    let server = MockServer::start().await;
    // No mock mounted at all: if `execute` ever tried to send, wiremock
    // would reject the unexpected request and the test would panic before
    // reaching the assertion below.
    let adapter = OpenAiAdapter::new();
    let credential_store = CredentialStore::with_credentials("openai", vec![(1, "key".to_string())]);
    let provider_cfg = ProviderConfig {
        api_base: Some(server.uri()),
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = executor()
        .execute(
            &adapter,
            &credential_store,
            &provider_cfg,
            "gpt-4o",
            &LLMRequest::new(vec![Message::user("hi")]),
            &cancel,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Canceled);
}
