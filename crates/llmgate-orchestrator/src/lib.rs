//! Drives the multi-turn tool-calling loop on top of a single-shot response
//! generator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use llmgate_types::{
    ContentPart, ErrorKind, GatewayError, GenerationConfig, LLMRequest, LLMResponse, Message,
    ToolChoice, ToolDefinition, validate_arguments,
};

/// Issues one canonical request and returns one canonical response. Model
/// handles implement this on top of `llmgate-executor`; this crate has no
/// dependency on credentials, adapters, or transport.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse, GatewayError>;
}

/// Caller-supplied tool implementation. The orchestrator never interprets
/// the returned string beyond passing it back to the model as a tool
/// result
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, arguments: &JsonValue) -> Result<String, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedPolicy {
    /// Return the last response as-is, with its unresolved tool calls attached.
    ReturnLast,
    Raise,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub max_tool_rounds: u32,
    pub on_exhausted: ExhaustedPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 5,
            on_exhausted: ExhaustedPolicy::ReturnLast,
        }
    }
}

pub struct ToolCallingOrchestrator {
    config: OrchestratorConfig,
}

impl ToolCallingOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    pub async fn run(
        &self,
        generator: Arc<dyn ResponseGenerator>,
        tool_executor: Arc<dyn ToolExecutor>,
        mut messages: Vec<Message>,
        config: GenerationConfig,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, GatewayError> {
        let tool_defs: HashMap<&str, &ToolDefinition> =
            tools.iter().map(|t| (t.name.as_str(), t)).collect();

        let mut round = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(GatewayError::new(ErrorKind::Canceled, "operation canceled"));
            }

            let request = LLMRequest {
                messages: messages.clone(),
                config: config.clone(),
                tools: tools.clone(),
                tool_choice: tool_choice.clone(),
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(GatewayError::new(ErrorKind::Canceled, "operation canceled"));
                }
                result = generator.generate(&request) => result?,
            };

            if !response.has_tool_calls() {
                return Ok(response);
            }

            round += 1;
            if round > self.config.max_tool_rounds {
                warn!(round, "tool loop exhausted");
                return match self.config.on_exhausted {
                    ExhaustedPolicy::ReturnLast => Ok(response),
                    ExhaustedPolicy::Raise => Err(GatewayError::new(
                        ErrorKind::ToolLoopExhausted,
                        format!("exceeded {} tool rounds", self.config.max_tool_rounds),
                    )),
                };
            }

            let mut assistant_content = Vec::new();
            if !response.text.is_empty() {
                assistant_content.push(ContentPart::Text(response.text.clone()));
            }
            for call in &response.tool_calls {
                assistant_content.push(ContentPart::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }
            messages.push(Message {
                role: llmgate_types::Role::Assistant,
                content: assistant_content,
                tool_call_id: None,
            });

            let dispatches = response.tool_calls.iter().map(|call| {
                let tool_executor = tool_executor.clone();
                let cancel = cancel.clone();
                let validation = tool_defs
                    .get(call.name.as_str())
                    .map(|def| validate_arguments(def, &call.arguments));

                async move {
                    if let Some(Err(reason)) = validation {
                        return format!("error: {reason}");
                    }
                    if validation.is_none() {
                        return format!("error: unknown tool '{}'", call.name);
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => "error: canceled".to_string(),
                        result = tool_executor.execute(&call.name, &call.arguments) => {
                            match result {
                                Ok(content) => content,
                                Err(reason) => format!("error: {reason}"),
                            }
                        }
                    }
                }
            });

            let results = join_all(dispatches).await;
            for (call, content) in response.tool_calls.iter().zip(results) {
                debug!(tool = %call.name, "tool result appended");
                messages.push(Message::tool_result(call.id.clone(), content));
            }

            if cancel.is_cancelled() {
                return Err(GatewayError::new(ErrorKind::Canceled, "operation canceled"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_types::{FinishReason, ToolCall, UsageInfo};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedGenerator {
        responses: std::sync::Mutex<Vec<LLMResponse>>,
    }

    #[async_trait]
    impl ResponseGenerator for ScriptedGenerator {
        async fn generate(&self, _request: &LLMRequest) -> Result<LLMResponse, GatewayError> {
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    struct EchoTool(AtomicU32);

    #[async_trait]
    impl ToolExecutor for EchoTool {
        async fn execute(&self, _name: &str, arguments: &JsonValue) -> Result<String, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(arguments.to_string())
        }
    }

    fn plain_response(text: &str) -> LLMResponse {
        LLMResponse {
            text: text.to_string(),
            tool_calls: vec![],
            usage: UsageInfo::default(),
            finish_reason: FinishReason::Stop,
            raw: JsonValue::Null,
            code_execution_results: vec![],
            grounding_metadata: None,
        }
    }

    fn tool_call_response(calls: Vec<ToolCall>) -> LLMResponse {
        LLMResponse {
            text: String::new(),
            tool_calls: calls,
            usage: UsageInfo::default(),
            finish_reason: FinishReason::ToolCalls,
            raw: JsonValue::Null,
            code_execution_results: vec![],
            grounding_metadata: None,
        }
    }

    #[tokio::test]
    async fn stops_immediately_when_no_tool_calls() {
        let generator = Arc::new(ScriptedGenerator {
            responses: std::sync::Mutex::new(vec![plain_response("hi")]),
        });
        let tool_executor = Arc::new(EchoTool(AtomicU32::new(0)));
        let orchestrator = ToolCallingOrchestrator::new(OrchestratorConfig::default());

        let result = orchestrator
            .run(
                generator,
                tool_executor,
                vec![Message::user("hello")],
                GenerationConfig::default(),
                vec![],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.text, "hi");
    }

    #[tokio::test]
    async fn dispatches_tool_calls_and_appends_results_in_order() {
        let calls = vec![
            ToolCall { id: "1".into(), name: "echo".into(), arguments: json!({"n": 1}) },
            ToolCall { id: "2".into(), name: "echo".into(), arguments: json!({"n": 2}) },
        ];
        let generator = Arc::new(ScriptedGenerator {
            responses: std::sync::Mutex::new(vec![tool_call_response(calls), plain_response("done")]),
        });
        let tool_executor = Arc::new(EchoTool(AtomicU32::new(0)));
        let orchestrator = ToolCallingOrchestrator::new(OrchestratorConfig::default());

        let tool_def = ToolDefinition {
            name: "echo".into(),
            description: "echoes".into(),
            parameters: json!({"type": "object", "properties": {"n": {"type": "integer"}}}),
            required: vec![],
        };

        let result = orchestrator
            .run(
                generator,
                tool_executor.clone(),
                vec![Message::user("call echo twice")],
                GenerationConfig::default(),
                vec![tool_def],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.text, "done");
        assert_eq!(tool_executor.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn schema_violation_injects_synthetic_error_without_invoking_tool() {
        let calls = vec![ToolCall {
            id: "1".into(),
            name: "add".into(),
            arguments: json!({"a": "two", "b": 3}),
        }];
        let generator = Arc::new(ScriptedGenerator {
            responses: std::sync::Mutex::new(vec![
                tool_call_response(calls),
                plain_response("can't add that"),
            ]),
        });
        let tool_executor = Arc::new(EchoTool(AtomicU32::new(0)));
        let orchestrator = ToolCallingOrchestrator::new(OrchestratorConfig::default());

        let tool_def = ToolDefinition {
            name: "add".into(),
            description: "adds two integers".into(),
            parameters: json!({"type": "object", "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}}),
            required: vec!["a".into(), "b".into()],
        };

        let result = orchestrator
            .run(
                generator,
                tool_executor.clone(),
                vec![Message::user("add two and three")],
                GenerationConfig::default(),
                vec![tool_def],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.text, "can't add that");
        assert_eq!(tool_executor.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausting_rounds_returns_last_response_by_default() {
        let calls = vec![ToolCall { id: "1".into(), name: "echo".into(), arguments: json!({}) }];
        let responses: Vec<_> = (0..6).map(|_| tool_call_response(calls.clone())).collect();
        let generator = Arc::new(ScriptedGenerator {
            responses: std::sync::Mutex::new(responses),
        });
        let tool_executor = Arc::new(EchoTool(AtomicU32::new(0)));
        let orchestrator = ToolCallingOrchestrator::new(OrchestratorConfig {
            max_tool_rounds: 2,
            on_exhausted: ExhaustedPolicy::ReturnLast,
        });

        let result = orchestrator
            .run(
                generator,
                tool_executor,
                vec![Message::user("loop")],
                GenerationConfig::default(),
                vec![],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.has_tool_calls());
    }
}
