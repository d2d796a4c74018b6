use std::fmt;

/// A parsed `provider/model` identifier: exactly one `/`, provider matching
/// `[A-Za-z0-9_.-]+`, model matching `[A-Za-z0-9_.:-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    pub provider: String,
    pub model: String,
}

impl ModelId {
    pub fn parse(raw: &str) -> Result<Self, ModelIdError> {
        let mut parts = raw.splitn(2, '/');
        let provider = parts.next().filter(|s| !s.is_empty());
        let model = parts.next().filter(|s| !s.is_empty());
        let (Some(provider), Some(model)) = (provider, model) else {
            return Err(ModelIdError::MissingSeparator(raw.to_string()));
        };
        if model.contains('/') {
            return Err(ModelIdError::TooManySeparators(raw.to_string()));
        }
        if !provider.chars().all(is_provider_char) {
            return Err(ModelIdError::InvalidProvider(provider.to_string()));
        }
        if !model.chars().all(is_model_char) {
            return Err(ModelIdError::InvalidModel(model.to_string()));
        }
        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

fn is_provider_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_model_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelIdError {
    #[error("model identifier '{0}' has no '/' separator")]
    MissingSeparator(String),
    #[error("model identifier '{0}' has more than one '/' separator")]
    TooManySeparators(String),
    #[error("provider name '{0}' contains characters outside [A-Za-z0-9_.-]")]
    InvalidProvider(String),
    #[error("model name '{0}' contains characters outside [A-Za-z0-9_.:-]")]
    InvalidModel(String),
}
