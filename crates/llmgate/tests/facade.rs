//! End-to-end coverage of `Gateway` against a local mock HTTP server: config
//! parsing, a single-shot `generate`, the tool-calling loop via
//! `run_with_tools`, and `embed`, all through the same public API a caller
//! of this crate would use.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llmgate::{GatewayConfig, LLMRequest, Message};
use llmgate_orchestrator::ToolExecutor;

fn config_for(server_uri: &str) -> GatewayConfig {
    let yaml = format!(
        r#"
default_model_name: "openai/gpt-4o"
PROVIDERS:
  - name: openai
    api_type: openai
    api_base: "{server_uri}"
    api_key: "sk-test"
    models:
      - model_name: gpt-4o
      - model_name: text-embedding-3-small
        is_embedding_model: true
"#
    );
    GatewayConfig::from_yaml(&yaml).unwrap()
}

#[tokio::test]
async fn generate_round_trips_a_plain_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "hi there" }, "finish_reason": "stop" }]
        })))
        .mount(&server)
        .await;

    let gateway = llmgate::Gateway::new(config_for(&server.uri()));
    let response = gateway
        .generate(
            "openai/gpt-4o",
            LLMRequest::new(vec![Message::user("hello")]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.text, "hi there");
}

struct AddTool;

#[async_trait]
impl ToolExecutor for AddTool {
    async fn execute(&self, _name: &str, arguments: &JsonValue) -> Result<String, String> {
        let a = arguments["a"].as_i64().ok_or("missing a")?;
        let b = arguments["b"].as_i64().ok_or("missing b")?;
        Ok((a + b).to_string())
    }
}

#[tokio::test]
async fn run_with_tools_drives_a_two_round_loop() {
    let server = MockServer::start().await;
    let call_count = Arc::new(AtomicU32::new(0));
    let counter = call_count.clone();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(move |_req: &wiremock::Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "function": { "name": "add", "arguments": "{\"a\":2,\"b\":3}" }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                }))
            } else {
                ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{ "message": { "content": "The sum is 5." }, "finish_reason": "stop" }]
                }))
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    let gateway = llmgate::Gateway::new(config_for(&server.uri()));
    let response = gateway
        .run_with_tools(
            "openai/gpt-4o",
            vec![Message::user("what is 2+3?")],
            Default::default(),
            vec![llmgate_types::ToolDefinition {
                name: "add".into(),
                description: "adds two integers".into(),
                parameters: json!({"type": "object", "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}}),
                required: vec!["a".into(), "b".into()],
            }],
            None,
            Arc::new(AddTool),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.text, "The sum is 5.");
    assert_eq!(call_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn embed_parses_vectors_from_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.1, 0.2, 0.3] }]
        })))
        .mount(&server)
        .await;

    let gateway = llmgate::Gateway::new(config_for(&server.uri()));
    let vectors = gateway
        .embed(
            "openai/text-embedding-3-small",
            &["hello world".to_string()],
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![0.1f32, 0.2, 0.3]]);
}
