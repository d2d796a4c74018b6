//! The Adapter Layer: translates the canonical request/response shapes to
//! and from each provider's wire format.

pub mod config;
pub mod providers;
mod registry;

use llmgate_credential::Credential;
use llmgate_transport::{HttpRequest, HttpResponse};
use llmgate_types::{ErrorKind, GatewayError, LLMRequest, LLMResponse};

pub use config::ProviderConfig;
pub use registry::{AdapterRegistry, RegistryError};

/// Capability flags an adapter may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Tools,
    Multimodal,
    Grounding,
    CodeExecution,
    Embeddings,
    Streaming,
    JsonMode,
}

/// One upstream wire protocol. Registered under `api_type()` in an
/// `AdapterRegistry` and otherwise stateless — adapter instances carry no
/// mutable state and require no locking
pub trait Adapter: Send + Sync {
    fn api_type(&self) -> &'static str;

    fn supports(&self, feature: Feature) -> bool;

    fn build_request(
        &self,
        request: &LLMRequest,
        credential: &Credential,
        provider_cfg: &ProviderConfig,
        model: &str,
    ) -> Result<HttpRequest, GatewayError>;

    fn parse_response(
        &self,
        response: &HttpResponse,
        provider_cfg: &ProviderConfig,
    ) -> Result<LLMResponse, GatewayError>;

    /// Builds an embeddings request.
    /// Default: adapters that don't support embeddings reject it outright.
    fn build_embed_request(
        &self,
        _texts: &[String],
        _credential: &Credential,
        _provider_cfg: &ProviderConfig,
        _model: &str,
        _task_type: Option<&str>,
    ) -> Result<HttpRequest, GatewayError> {
        Err(GatewayError::new(
            ErrorKind::UnsupportedFeature,
            format!("{} adapter does not support embeddings", self.api_type()),
        ))
    }

    fn parse_embed_response(&self, _response: &HttpResponse) -> Result<Vec<Vec<f32>>, GatewayError> {
        Err(GatewayError::new(
            ErrorKind::UnsupportedFeature,
            format!("{} adapter does not support embeddings", self.api_type()),
        ))
    }
}
