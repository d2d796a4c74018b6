//! The public facade: wires the Credential Store, Request Executor, Adapter
//! Layer, Tool-Calling Orchestrator, and Model Registry into one `Gateway`.

pub mod config;
mod factory;
mod model;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use llmgate_adapter::providers::{GeminiAdapter, OpenAiAdapter, ZhipuAdapter};
use llmgate_adapter::AdapterRegistry;
use llmgate_executor::{ExecutorConfig, RequestExecutor};
use llmgate_orchestrator::{OrchestratorConfig, ToolCallingOrchestrator, ToolExecutor};
use llmgate_registry::{ModelRegistry, RegistryConfig};
use llmgate_transport::{Transport, TransportConfig};
use llmgate_types::{GatewayError, GenerationConfig, LLMRequest, LLMResponse, Message, ToolChoice, ToolDefinition};

pub use config::GatewayConfig;
pub use factory::ConfigModelFactory;
pub use model::ModelResponseGenerator;

pub use llmgate_adapter::Feature;
pub use llmgate_orchestrator::{ExhaustedPolicy, ResponseGenerator};
pub use llmgate_types::{ContentPart, ErrorKind, MediaSource, ModelId, Role, ToolCall};

/// Installs a `tracing-subscriber` formatter honoring `RUST_LOG`. Optional:
/// callers that already run their own subscriber should skip this.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Top-level entry point. Owns one `ModelRegistry` (and therefore one
/// `AdapterRegistry`, one `Transport`, and one `RequestExecutor`) per
/// process; callers needing multiple independent configurations construct
/// multiple `Gateway`s.
pub struct Gateway {
    registry: ModelRegistry<ConfigModelFactory>,
    executor: Arc<RequestExecutor>,
    orchestrator_config: OrchestratorConfig,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        let transport_config = TransportConfig {
            proxy: config.proxy.clone(),
            request_timeout: config
                .timeout
                .map(std::time::Duration::from_secs)
                .unwrap_or(TransportConfig::default().request_timeout),
            ..TransportConfig::default()
        };
        Self::with_options(
            config,
            Self::default_adapters(),
            transport_config,
            ExecutorConfig::default(),
            OrchestratorConfig::default(),
        )
    }

    /// An `AdapterRegistry` pre-populated with the `openai`, `gemini`, and
    /// `zhipu` adapters this crate ships. Callers wiring in a provider of
    /// their own start from this, call `register` with their own `Adapter`
    /// impl, and pass the result to `with_options`.
    pub fn default_adapters() -> Arc<AdapterRegistry> {
        let adapters = Arc::new(AdapterRegistry::new());
        adapters.register(Arc::new(OpenAiAdapter::new()));
        adapters.register(Arc::new(GeminiAdapter::new()));
        adapters.register(Arc::new(ZhipuAdapter::new()));
        adapters
    }

    pub fn with_options(
        config: GatewayConfig,
        adapters: Arc<AdapterRegistry>,
        transport_config: TransportConfig,
        executor_config: ExecutorConfig,
        orchestrator_config: OrchestratorConfig,
    ) -> Self {
        let factory = ConfigModelFactory::new(config, adapters);
        let registry = ModelRegistry::new(factory, RegistryConfig::default());
        let executor = Arc::new(RequestExecutor::new(Transport::new(transport_config), executor_config));

        Self { registry, executor, orchestrator_config }
    }

    /// Resolves `model` (a `provider/model` string) and issues one
    /// single-shot request, with no tool-calling loop. Canceling `cancel`
    /// aborts the in-flight send or backoff sleep of the current attempt.
    pub async fn generate(
        &self,
        model: &str,
        request: LLMRequest,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, GatewayError> {
        let handle = self.registry.lookup(model).await?;
        let generator = ModelResponseGenerator::new(handle, self.executor.clone(), cancel);
        generator.generate(&request).await
    }

    /// Resolves `model` and drives the full tool-calling loop via the
    /// Tool-Calling Orchestrator
    pub async fn run_with_tools(
        &self,
        model: &str,
        messages: Vec<Message>,
        config: GenerationConfig,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
        tool_executor: Arc<dyn ToolExecutor>,
        cancel: CancellationToken,
    ) -> Result<LLMResponse, GatewayError> {
        let handle = self.registry.lookup(model).await?;
        let generator: Arc<dyn ResponseGenerator> =
            Arc::new(ModelResponseGenerator::new(handle, self.executor.clone(), cancel.clone()));
        let orchestrator = ToolCallingOrchestrator::new(self.orchestrator_config);
        orchestrator
            .run(generator, tool_executor, messages, config, tools, tool_choice, cancel)
            .await
    }

    /// Embeds `texts` under `model`. `task_type` is forwarded only to
    /// adapters that honor it (currently Gemini); others ignore it. Canceling
    /// `cancel` aborts the in-flight send or backoff sleep of the current
    /// attempt.
    pub async fn embed(
        &self,
        model: &str,
        texts: &[String],
        task_type: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, GatewayError> {
        let handle = self.registry.lookup(model).await?;
        self.executor
            .execute_embed(
                handle.adapter.as_ref(),
                &handle.credential_store,
                &handle.provider_cfg,
                &handle.id.model,
                texts,
                task_type,
                &cancel,
            )
            .await
            .map_err(|e| e.with_provider(handle.id.provider.clone()))
    }

    pub async fn flush_cache(&self) {
        self.registry.flush().await;
    }

    pub async fn stats(&self) -> llmgate_registry::RegistryStats {
        self.registry.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_model_name: "openai/gpt-4o"
PROVIDERS:
  - name: openai
    api_type: openai
    api_base: "https://api.openai.com/v1"
    api_key: "sk-test"
    models:
      - model_name: gpt-4o
        temperature: 0.3
  - name: mystery
    api_type: unregistered_provider
    api_base: "https://example.com"
    api_key: "key"
"#;

    #[tokio::test]
    async fn unknown_provider_name_yields_config_error() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        let gateway = Gateway::new(config);
        let err = gateway
            .generate(
                "nosuchprovider/model",
                LLMRequest::new(vec![Message::user("hi")]),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigError);
    }

    #[tokio::test]
    async fn unregistered_api_type_yields_config_error() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        let gateway = Gateway::new(config);
        let err = gateway
            .generate(
                "mystery/whatever",
                LLMRequest::new(vec![Message::user("hi")]),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigError);
    }
}
