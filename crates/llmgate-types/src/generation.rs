use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Discriminant for `GenerationConfig::response_format`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { schema: JsonValue },
}

/// Provider-side harm-category threshold, used by `GenerationConfig::safety_settings`.
pub type SafetySettings = BTreeMap<String, String>;

/// The flat set of generation knobs every adapter understands a subset of.
/// Fields an adapter doesn't recognize or support are silently ignored
/// rather than rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(default)]
    pub enable_code_execution: bool,
    #[serde(default)]
    pub enable_grounding: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<SafetySettings>,
}

impl GenerationConfig {
    /// Overlays `self` on top of `base`, returning the merged config
    /// (per-call values win, falling back to `base`'s where unset). Used to
    /// apply a model's `default_overrides` beneath a per-call config.
    pub fn merged_over(&self, base: &GenerationConfig) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature.or(base.temperature),
            max_tokens: self.max_tokens.or(base.max_tokens),
            top_p: self.top_p.or(base.top_p),
            top_k: self.top_k.or(base.top_k),
            frequency_penalty: self.frequency_penalty.or(base.frequency_penalty),
            presence_penalty: self.presence_penalty.or(base.presence_penalty),
            repetition_penalty: self.repetition_penalty.or(base.repetition_penalty),
            stop: if self.stop.is_empty() {
                base.stop.clone()
            } else {
                self.stop.clone()
            },
            response_format: self
                .response_format
                .clone()
                .or_else(|| base.response_format.clone()),
            response_mime_type: self
                .response_mime_type
                .clone()
                .or_else(|| base.response_mime_type.clone()),
            enable_code_execution: self.enable_code_execution || base.enable_code_execution,
            enable_grounding: self.enable_grounding || base.enable_grounding,
            thinking_budget: self.thinking_budget.or(base.thinking_budget),
            safety_settings: self
                .safety_settings
                .clone()
                .or_else(|| base.safety_settings.clone()),
        }
    }

    /// Validates numeric ranges and rejects setting both `response_format`
    /// and `response_mime_type` at once, since their precedence is unspecified.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(format!("temperature {t} out of range [0.0, 2.0]"));
        }
        if let Some(b) = self.thinking_budget
            && !(0.0..=1.0).contains(&b)
        {
            return Err(format!("thinking_budget {b} out of range [0.0, 1.0]"));
        }
        if self.response_format.is_some() && self.response_mime_type.is_some() {
            return Err(
                "response_format and response_mime_type are both set; precedence is unspecified"
                    .to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_over_prefers_self_then_falls_back_to_base() {
        let base = GenerationConfig {
            temperature: Some(0.5),
            max_tokens: Some(100),
            ..Default::default()
        };
        let overrides = GenerationConfig {
            max_tokens: Some(200),
            ..Default::default()
        };
        let merged = overrides.merged_over(&base);
        assert_eq!(merged.temperature, Some(0.5));
        assert_eq!(merged.max_tokens, Some(200));
    }

    #[test]
    fn validate_rejects_conflicting_json_config() {
        let cfg = GenerationConfig {
            response_format: Some(ResponseFormat::JsonObject),
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let cfg = GenerationConfig {
            temperature: Some(2.5),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
