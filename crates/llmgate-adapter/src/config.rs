use llmgate_types::GenerationConfig;

/// Per-provider settings loaded by the caller (the loading mechanism itself
/// lives in the facade crate).
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_base: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    /// Models this provider is known to accept multimodal content for.
    /// Outside this list, the OpenAI-compatible adapter rejects multimodal
    /// parts with `UnsupportedFeature`.
    pub multimodal_models: Vec<String>,
    pub default_overrides: GenerationConfig,
}

impl ProviderConfig {
    pub fn base_url<'a>(&'a self, default: &'a str) -> &'a str {
        self.api_base.as_deref().unwrap_or(default)
    }

    pub fn supports_multimodal(&self, model: &str) -> bool {
        self.multimodal_models.iter().any(|m| m == model)
    }
}

/// Joins `base` and `path`, tolerating a trailing slash on `base` and a
/// leading slash on `path`.
pub fn build_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
