//! Resolves a parsed `GatewayConfig` into `ModelHandle`s on cache miss. The
//! `ModelFactory` impl a `ModelRegistry` calls back into.

use std::sync::Arc;

use llmgate_adapter::{AdapterRegistry, ProviderConfig};
use llmgate_credential::CredentialStore;
use llmgate_registry::{ModelFactory, ModelHandle};
use llmgate_types::{ErrorKind, GatewayError, ModelId};

use crate::config::GatewayConfig;

pub struct ConfigModelFactory {
    config: GatewayConfig,
    adapters: Arc<AdapterRegistry>,
}

impl ConfigModelFactory {
    pub fn new(config: GatewayConfig, adapters: Arc<AdapterRegistry>) -> Self {
        Self { config, adapters }
    }
}

impl ModelFactory for ConfigModelFactory {
    fn create(&self, id: &ModelId) -> Result<ModelHandle, GatewayError> {
        let provider = self.config.provider(&id.provider).ok_or_else(|| {
            GatewayError::new(
                ErrorKind::ConfigError,
                format!("no PROVIDERS entry named '{}'", id.provider),
            )
        })?;

        let adapter = self.adapters.get(&provider.api_type).map_err(|e| {
            GatewayError::new(ErrorKind::ConfigError, e.to_string()).with_provider(id.provider.clone())
        })?;

        let model_entry = provider.model(&id.model);
        let default_overrides = model_entry
            .map(|m| m.default_overrides())
            .unwrap_or_default();

        let multimodal_models = provider
            .models
            .iter()
            .filter(|m| !m.is_embedding_model)
            .map(|m| m.model_name.clone())
            .collect();

        let provider_cfg = Arc::new(ProviderConfig {
            api_base: Some(provider.api_base.clone()),
            extra_headers: provider.extra_headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            multimodal_models,
            default_overrides: default_overrides.clone(),
        });

        let keys = provider.api_key.clone().into_vec();
        let seeded = keys
            .into_iter()
            .enumerate()
            .map(|(idx, key)| (idx as u64, key))
            .collect();
        let credential_store = Arc::new(CredentialStore::with_credentials(provider.name.clone(), seeded));

        Ok(ModelHandle {
            id: id.clone(),
            adapter,
            credential_store,
            provider_cfg,
            default_config: default_overrides,
        })
    }
}
