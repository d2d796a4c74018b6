//! Bridges a cached `ModelHandle` to the orchestrator's `ResponseGenerator`
//! trait by running it through a `RequestExecutor`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use llmgate_executor::RequestExecutor;
use llmgate_orchestrator::ResponseGenerator;
use llmgate_registry::ModelHandle;
use llmgate_types::{ErrorKind, GatewayError, LLMRequest, LLMResponse};

/// Bridges a cached handle to `ResponseGenerator`. Carries its own
/// cancellation token since the trait's `generate` signature (shared with
/// the orchestrator, which races its own `select!` around each call) has no
/// room for one.
pub struct ModelResponseGenerator {
    handle: Arc<ModelHandle>,
    executor: Arc<RequestExecutor>,
    cancel: CancellationToken,
}

impl ModelResponseGenerator {
    pub fn new(handle: Arc<ModelHandle>, executor: Arc<RequestExecutor>, cancel: CancellationToken) -> Self {
        Self { handle, executor, cancel }
    }
}

#[async_trait]
impl ResponseGenerator for ModelResponseGenerator {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse, GatewayError> {
        let config = request.config.merged_over(&self.handle.default_config);
        config
            .validate()
            .map_err(|msg| GatewayError::new(ErrorKind::BadRequest, msg).with_model(self.handle.id.to_string()))?;

        let merged_request = LLMRequest {
            messages: request.messages.clone(),
            config,
            tools: request.tools.clone(),
            tool_choice: request.tool_choice.clone(),
        };

        self.executor
            .execute(
                self.handle.adapter.as_ref(),
                &self.handle.credential_store,
                &self.handle.provider_cfg,
                &self.handle.id.model,
                &merged_request,
                &self.cancel,
            )
            .await
            .map_err(|e| e.with_provider(self.handle.id.provider.clone()))
    }
}
