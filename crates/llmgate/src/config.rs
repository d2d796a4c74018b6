//! Parses the external provider-configuration document into the shapes the
//! rest of the gateway consumes: a flat list of named providers, each with
//! an api_type, a base URL, one or more API keys, and a model list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use llmgate_types::GenerationConfig;

/// One or more API keys for a provider. A single string is equivalent to a
/// one-element list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiKeys {
    Single(String),
    Many(Vec<String>),
}

impl ApiKeys {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ApiKeys::Single(s) => vec![s],
            ApiKeys::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model_name: String,
    #[serde(default)]
    pub is_embedding_model: bool,
    #[serde(default)]
    pub max_input_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ModelEntry {
    /// The `GenerationConfig` overrides this model entry contributes, merged
    /// beneath per-call config by `ModelFactory::create`.
    pub fn default_overrides(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub api_type: String,
    pub api_base: String,
    pub api_key: ApiKeys,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub default_model_name: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(rename = "PROVIDERS")]
    pub providers: Vec<ProviderEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse gateway config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("provider '{0}' not found in config")]
    UnknownProvider(String),
}

impl GatewayConfig {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.name == name)
    }
}

impl ProviderEntry {
    pub fn model(&self, model_name: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.model_name == model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_model_name: "openai/gpt-4o"
proxy: null
timeout: 30
PROVIDERS:
  - name: openai
    api_type: openai
    api_base: "https://api.openai.com/v1"
    api_key: ["sk-a", "sk-b"]
    models:
      - model_name: gpt-4o
        temperature: 0.7
      - model_name: text-embedding-3-small
        is_embedding_model: true
"#;

    #[test]
    fn parses_sample_config() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.default_model_name.as_deref(), Some("openai/gpt-4o"));
        let provider = config.provider("openai").unwrap();
        assert_eq!(provider.api_key.clone().into_vec(), vec!["sk-a", "sk-b"]);
        let model = provider.model("gpt-4o").unwrap();
        assert_eq!(model.temperature, Some(0.7));
    }

    #[test]
    fn accepts_single_string_api_key() {
        let yaml = r#"
PROVIDERS:
  - name: zhipu
    api_type: zhipu
    api_base: "https://open.bigmodel.cn/api/paas/v4"
    api_key: "only-one-key"
"#;
        let config = GatewayConfig::from_yaml(yaml).unwrap();
        let provider = config.provider("zhipu").unwrap();
        assert_eq!(provider.api_key.clone().into_vec(), vec!["only-one-key"]);
    }
}
