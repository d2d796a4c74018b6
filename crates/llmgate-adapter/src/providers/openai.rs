use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use llmgate_credential::Credential;
use llmgate_transport::{HttpMethod, HttpRequest, HttpResponse};
use llmgate_types::{
    ContentPart, ErrorKind, FinishReason, GatewayError, LLMRequest, LLMResponse, MediaSource,
    Message, Role, ToolCall, ToolChoice, UsageInfo,
};

use crate::config::{ProviderConfig, build_url};
use crate::{Adapter, Feature};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The OpenAI-compatible adapter. `ZhipuAdapter` reuses the wire-shape
/// builders here and only overrides auth headers and error extraction.
#[derive(Debug, Default)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for OpenAiAdapter {
    fn api_type(&self) -> &'static str {
        "openai"
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Tools | Feature::Multimodal | Feature::JsonMode | Feature::Embeddings
        )
    }

    fn build_request(
        &self,
        request: &LLMRequest,
        credential: &Credential,
        provider_cfg: &ProviderConfig,
        model: &str,
    ) -> Result<HttpRequest, GatewayError> {
        let url = build_url(
            provider_cfg.base_url(DEFAULT_BASE_URL),
            "chat/completions",
        );
        let body = build_chat_body(request, provider_cfg, model)?;
        let bytes = serde_json::to_vec(&body).map_err(|e| {
            GatewayError::new(ErrorKind::BadRequest, e.to_string()).with_model(model)
        })?;

        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", credential.api_key)),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
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
        parse_chat_response(response)
    }

    fn build_embed_request(
        &self,
        texts: &[String],
        credential: &Credential,
        provider_cfg: &ProviderConfig,
        model: &str,
        _task_type: Option<&str>,
    ) -> Result<HttpRequest, GatewayError> {
        let url = build_url(provider_cfg.base_url(DEFAULT_BASE_URL), "embeddings");
        let body = serde_json::json!({ "model": model, "input": texts });
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| GatewayError::new(ErrorKind::BadRequest, e.to_string()))?;

        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", credential.api_key)),
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

    fn parse_embed_response(&self, response: &HttpResponse) -> Result<Vec<Vec<f32>>, GatewayError> {
        let raw: JsonValue = serde_json::from_slice(&response.body).unwrap_or(JsonValue::Null);
        if !response.is_success() {
            return Err(classify_openai_error(response, &raw));
        }
        let data = raw
            .get("data")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| GatewayError::new(ErrorKind::ParseError, "embeddings response had no data"))?;

        data.iter()
            .map(|item| {
                item.get("embedding")
                    .and_then(JsonValue::as_array)
                    .map(|vec| vec.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
                    .ok_or_else(|| GatewayError::new(ErrorKind::ParseError, "embedding entry missing vector"))
            })
            .collect()
    }
}

/// Builds the `{messages, tools, tool_choice, ...}` chat-completion body
/// shared by the OpenAI and Zhipu adapters.
pub(crate) fn build_chat_body(
    request: &LLMRequest,
    provider_cfg: &ProviderConfig,
    model: &str,
) -> Result<JsonValue, GatewayError> {
    let config = request.config.merged_over(&provider_cfg.default_overrides);
    config
        .validate()
        .map_err(|msg| GatewayError::new(ErrorKind::BadRequest, msg).with_model(model))?;

    let multimodal_allowed = provider_cfg.supports_multimodal(model);
    let messages = request
        .messages
        .iter()
        .map(|m| to_wire_message(m, multimodal_allowed))
        .collect::<Result<Vec<_>, GatewayError>>()?;

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
    });
    let obj = body.as_object_mut().expect("object literal");

    if let Some(t) = config.temperature {
        obj.insert("temperature".into(), t.into());
    }
    if let Some(t) = config.max_tokens {
        obj.insert("max_tokens".into(), t.into());
    }
    if let Some(t) = config.top_p {
        obj.insert("top_p".into(), t.into());
    }
    if let Some(t) = config.frequency_penalty {
        obj.insert("frequency_penalty".into(), t.into());
    }
    if let Some(t) = config.presence_penalty {
        obj.insert("presence_penalty".into(), t.into());
    }
    if !config.stop.is_empty() {
        obj.insert("stop".into(), config.stop.clone().into());
    }
    if let Some(mime) = &config.response_mime_type {
        obj.insert(
            "response_format".into(),
            serde_json::json!({ "type": if mime.contains("json") { "json_object" } else { "text" } }),
        );
    }

    if !request.tools.is_empty() {
        let tools: Vec<JsonValue> = request
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        obj.insert("tools".into(), tools.into());
    }

    if let Some(choice) = &request.tool_choice {
        obj.insert("tool_choice".into(), tool_choice_to_wire(choice));
    }

    Ok(body)
}

fn tool_choice_to_wire(choice: &ToolChoice) -> JsonValue {
    match choice {
        ToolChoice::Auto => JsonValue::String("auto".to_string()),
        ToolChoice::None => JsonValue::String("none".to_string()),
        ToolChoice::Required => JsonValue::String("required".to_string()),
        ToolChoice::Specific { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

fn to_wire_message(message: &Message, multimodal_allowed: bool) -> Result<JsonValue, GatewayError> {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if message.role == Role::Tool {
        let (call_id, content) = message
            .content
            .iter()
            .find_map(|p| match p {
                ContentPart::ToolResult { call_id, content } => Some((call_id.clone(), content.clone())),
                _ => None,
            })
            .ok_or_else(|| {
                GatewayError::new(ErrorKind::BadRequest, "tool message missing ToolResult part")
            })?;
        return Ok(serde_json::json!({
            "role": role,
            "tool_call_id": call_id,
            "content": content,
        }));
    }

    let has_multimodal = message.content.iter().any(ContentPart::is_multimodal);
    if has_multimodal && !multimodal_allowed {
        return Err(GatewayError::new(
            ErrorKind::UnsupportedFeature,
            "model is not configured as multimodal-capable",
        ));
    }

    let tool_calls: Vec<JsonValue> = message
        .content
        .iter()
        .filter_map(|p| match p {
            ContentPart::ToolCall { id, name, arguments } => Some(serde_json::json!({
                "id": id,
                "type": "function",
                "function": { "name": name, "arguments": arguments.to_string() },
            })),
            _ => None,
        })
        .collect();

    let content = if has_multimodal {
        JsonValue::Array(
            message
                .content
                .iter()
                .filter_map(|p| content_part_to_wire(p))
                .collect(),
        )
    } else {
        JsonValue::String(message.text())
    };

    let mut wire = serde_json::json!({ "role": role, "content": content });
    if !tool_calls.is_empty() {
        wire.as_object_mut()
            .unwrap()
            .insert("tool_calls".into(), tool_calls.into());
    }
    Ok(wire)
}

fn content_part_to_wire(part: &ContentPart) -> Option<JsonValue> {
    match part {
        ContentPart::Text(text) => Some(serde_json::json!({ "type": "text", "text": text })),
        ContentPart::Image(src) => Some(serde_json::json!({
            "type": "image_url",
            "image_url": { "url": media_source_to_url(src) },
        })),
        _ => None,
    }
}

fn media_source_to_url(source: &MediaSource) -> String {
    match source {
        MediaSource::Inline { mime_type, data } => format!("data:{mime_type};base64,{data}"),
        MediaSource::Uri { uri, .. } => uri.clone(),
        MediaSource::LocalPath { path, .. } => path.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

pub(crate) fn parse_chat_response(response: &HttpResponse) -> Result<LLMResponse, GatewayError> {
    let raw: JsonValue = serde_json::from_slice(&response.body).unwrap_or(JsonValue::Null);

    if !response.is_success() {
        return Err(classify_openai_error(response, &raw));
    }

    let parsed: ChatCompletionResponse = serde_json::from_value(raw.clone())
        .map_err(|e| GatewayError::new(ErrorKind::ParseError, e.to_string()))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::new(ErrorKind::ParseError, "response had no choices"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|tc| {
            let arguments = serde_json::from_str(&tc.function.arguments)
                .unwrap_or_else(|_| JsonValue::String(tc.function.arguments.clone()));
            ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments,
            }
        })
        .collect::<Vec<_>>();

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    };

    let usage = parsed
        .usage
        .map(|u| UsageInfo {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(LLMResponse {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
        usage,
        finish_reason,
        raw,
        code_execution_results: Vec::new(),
        grounding_metadata: None,
    })
}

pub(crate) fn classify_openai_error(response: &HttpResponse, raw: &JsonValue) -> GatewayError {
    let message = raw
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    let kind = match response.status {
        401 | 403 => ErrorKind::AuthError,
        429 => ErrorKind::RateLimited,
        400 | 404 | 422 => ErrorKind::BadRequest,
        s if (500..600).contains(&s) => ErrorKind::ServerError,
        _ => ErrorKind::ServerError,
    };
    GatewayError::new(kind, message)
}
