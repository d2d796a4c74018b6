use bytes::Bytes;
use serde_json::Value as JsonValue;

use llmgate_credential::Credential;
use llmgate_transport::{HttpMethod, HttpRequest, HttpResponse};
use llmgate_types::{
    CodeExecutionResult, ContentPart, ErrorKind, FinishReason, GatewayError, LLMRequest,
    LLMResponse, MediaSource, Message, Role, ToolCall, UsageInfo,
};

use crate::config::{ProviderConfig, build_url};
use crate::{Adapter, Feature};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// The Gemini adapter.
#[derive(Debug, Default)]
pub struct GeminiAdapter;

impl GeminiAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for GeminiAdapter {
    fn api_type(&self) -> &'static str {
        "gemini"
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Tools
                | Feature::Multimodal
                | Feature::Grounding
                | Feature::CodeExecution
                | Feature::JsonMode
        )
    }

    fn build_request(
        &self,
        request: &LLMRequest,
        credential: &Credential,
        provider_cfg: &ProviderConfig,
        model: &str,
    ) -> Result<HttpRequest, GatewayError> {
        let config = request.config.merged_over(&provider_cfg.default_overrides);
        config
            .validate()
            .map_err(|msg| GatewayError::new(ErrorKind::BadRequest, msg).with_model(model))?;

        let (system_instruction, contents) = split_system_instruction(&request.messages);

        let mut body = serde_json::json!({ "contents": contents });
        let obj = body.as_object_mut().expect("object literal");

        if let Some(system) = system_instruction {
            obj.insert(
                "systemInstruction".into(),
                serde_json::json!({ "parts": [{ "text": system }] }),
            );
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(t) = config.temperature {
            generation_config.insert("temperature".into(), t.into());
        }
        if let Some(t) = config.max_tokens {
            generation_config.insert("maxOutputTokens".into(), t.into());
        }
        if let Some(t) = config.top_p {
            generation_config.insert("topP".into(), t.into());
        }
        if let Some(t) = config.top_k {
            generation_config.insert("topK".into(), t.into());
        }
        if !config.stop.is_empty() {
            generation_config.insert("stopSequences".into(), config.stop.clone().into());
        }
        if let Some(mime) = &config.response_mime_type {
            generation_config.insert("responseMimeType".into(), mime.clone().into());
        }
        if !generation_config.is_empty() {
            obj.insert("generationConfig".into(), generation_config.into());
        }

        if let Some(safety) = &config.safety_settings {
            let settings: Vec<JsonValue> = safety
                .iter()
                .map(|(category, threshold)| {
                    serde_json::json!({ "category": category, "threshold": threshold })
                })
                .collect();
            obj.insert("safetySettings".into(), settings.into());
        }

        let mut tools = Vec::new();
        if !request.tools.is_empty() {
            let declarations: Vec<JsonValue> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            tools.push(serde_json::json!({ "functionDeclarations": declarations }));
        }
        if config.enable_code_execution {
            tools.push(serde_json::json!({ "codeExecution": {} }));
        }
        if config.enable_grounding {
            tools.push(serde_json::json!({ "googleSearchRetrieval": {} }));
        }
        if !tools.is_empty() {
            obj.insert("tools".into(), tools.into());
        }

        let bytes = serde_json::to_vec(&body)
            .map_err(|e| GatewayError::new(ErrorKind::BadRequest, e.to_string()))?;

        let base = provider_cfg.base_url(DEFAULT_BASE_URL);
        let url = format!(
            "{}?key={}",
            build_url(base, &format!("v1beta/models/{model}:generateContent")),
            credential.api_key
        );

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
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
        let raw: JsonValue = serde_json::from_slice(&response.body).unwrap_or(JsonValue::Null);

        if !response.is_success() {
            return Err(classify_gemini_error(response, &raw));
        }

        if let Some(block_reason) = raw
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(JsonValue::as_str)
        {
            return Err(GatewayError::new(
                ErrorKind::ContentFiltered,
                format!("blocked by safety filter: {block_reason}"),
            ));
        }

        let candidate = raw
            .get("candidates")
            .and_then(JsonValue::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| GatewayError::new(ErrorKind::ParseError, "response had no candidates"))?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut code_execution_results = Vec::new();

        for part in &parts {
            if let Some(t) = part.get("text").and_then(JsonValue::as_str) {
                text.push_str(t);
            } else if let Some(fc) = part.get("functionCall") {
                let name = fc
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                let arguments = fc.get("args").cloned().unwrap_or(JsonValue::Null);
                tool_calls.push(ToolCall {
                    id: name.clone(),
                    name,
                    arguments,
                });
            } else if let Some(code) = part.get("executableCode") {
                let lang_code = code
                    .get("code")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                code_execution_results.push(CodeExecutionResult {
                    code: lang_code,
                    output: String::new(),
                    succeeded: true,
                });
            } else if let Some(result) = part.get("codeExecutionResult") {
                let outcome = result
                    .get("outcome")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("OUTCOME_UNKNOWN");
                let output = result
                    .get("output")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                if let Some(last) = code_execution_results.last_mut() {
                    last.output = output;
                    last.succeeded = outcome == "OUTCOME_OK";
                } else {
                    code_execution_results.push(CodeExecutionResult {
                        code: String::new(),
                        output,
                        succeeded: outcome == "OUTCOME_OK",
                    });
                }
            }
        }

        let finish_reason = match candidate.get("finishReason").and_then(JsonValue::as_str) {
            _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
            Some("STOP") | None => FinishReason::Stop,
            Some(_) => FinishReason::Stop,
        };

        let usage = raw
            .get("usageMetadata")
            .map(|u| UsageInfo {
                prompt_tokens: u.get("promptTokenCount").and_then(JsonValue::as_u64).unwrap_or(0) as u32,
                completion_tokens: u
                    .get("candidatesTokenCount")
                    .and_then(JsonValue::as_u64)
                    .unwrap_or(0) as u32,
                total_tokens: u.get("totalTokenCount").and_then(JsonValue::as_u64).unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        let grounding_metadata = candidate.get("groundingMetadata").cloned();

        Ok(LLMResponse {
            text,
            tool_calls,
            usage,
            finish_reason,
            raw,
            code_execution_results,
            grounding_metadata,
        })
    }

    fn build_embed_request(
        &self,
        texts: &[String],
        credential: &Credential,
        provider_cfg: &ProviderConfig,
        model: &str,
        task_type: Option<&str>,
    ) -> Result<HttpRequest, GatewayError> {
        let requests: Vec<JsonValue> = texts
            .iter()
            .map(|t| {
                let mut req = serde_json::json!({
                    "model": format!("models/{model}"),
                    "content": { "parts": [{ "text": t }] },
                });
                if let Some(task_type) = task_type {
                    req["taskType"] = JsonValue::String(task_type.to_string());
                }
                req
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let url = build_url(
            provider_cfg.base_url(DEFAULT_BASE_URL),
            &format!("v1beta/models/{model}:batchEmbedContents?key={}", credential.api_key),
        );
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        headers.extend(provider_cfg.extra_headers.clone());

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(serde_json::to_vec(&body).map_err(|e| {
                GatewayError::new(ErrorKind::BadRequest, format!("failed to serialize embed request: {e}"))
            })?)),
        })
    }

    fn parse_embed_response(&self, response: &HttpResponse) -> Result<Vec<Vec<f32>>, GatewayError> {
        let raw: JsonValue = serde_json::from_slice(&response.body).unwrap_or(JsonValue::Null);

        if !response.is_success() {
            return Err(classify_gemini_error(response, &raw));
        }

        let embeddings = raw
            .get("embeddings")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| GatewayError::new(ErrorKind::ParseError, "gemini embed response missing 'embeddings'"))?;

        embeddings
            .iter()
            .map(|e| {
                e.get("values")
                    .and_then(JsonValue::as_array)
                    .map(|vals| {
                        vals.iter()
                            .filter_map(JsonValue::as_f64)
                            .map(|v| v as f32)
                            .collect()
                    })
                    .ok_or_else(|| {
                        GatewayError::new(ErrorKind::ParseError, "gemini embedding missing 'values'")
                    })
            })
            .collect()
    }
}

/// Gemini has no system role: leading system messages are merged into a
/// single `systemInstruction` string; everything else becomes `contents`.
fn split_system_instruction(messages: &[Message]) -> (Option<String>, Vec<JsonValue>) {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in messages {
        if message.role == Role::System {
            system_parts.push(message.text());
            continue;
        }
        contents.push(message_to_wire(message));
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n"))
    };
    (system, contents)
}

fn message_to_wire(message: &Message) -> JsonValue {
    let role = match message.role {
        Role::Assistant => "model",
        // Gemini has no dedicated tool role; results ride back as a "user" turn.
        Role::User | Role::Tool | Role::System => "user",
    };
    let parts: Vec<JsonValue> = message.content.iter().map(content_part_to_wire).collect();
    serde_json::json!({ "role": role, "parts": parts })
}

fn content_part_to_wire(part: &ContentPart) -> JsonValue {
    match part {
        ContentPart::Text(text) => serde_json::json!({ "text": text }),
        ContentPart::Image(src) | ContentPart::Video(src) | ContentPart::Audio(src) | ContentPart::File(src) => {
            media_source_to_wire(src)
        }
        ContentPart::ToolCall { name, arguments, .. } => {
            serde_json::json!({ "functionCall": { "name": name, "args": arguments } })
        }
        // `call_id` doubles as the function name Gemini expects here; the
        // canonical `ToolCall` this answers was built with the same value.
        ContentPart::ToolResult { call_id, content } => {
            serde_json::json!({
                "functionResponse": { "name": call_id, "response": { "content": content } }
            })
        }
        ContentPart::Thought(text) => serde_json::json!({ "text": text }),
    }
}

fn media_source_to_wire(source: &MediaSource) -> JsonValue {
    match source {
        MediaSource::Inline { mime_type, data } => {
            serde_json::json!({ "inlineData": { "mimeType": mime_type, "data": data } })
        }
        MediaSource::Uri { mime_type, uri } => {
            serde_json::json!({ "fileData": { "mimeType": mime_type, "fileUri": uri } })
        }
        MediaSource::LocalPath { .. } => {
            serde_json::json!({ "text": "" })
        }
    }
}

fn classify_gemini_error(response: &HttpResponse, raw: &JsonValue) -> GatewayError {
    let message = raw
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    let kind = match response.status {
        401 | 403 => ErrorKind::AuthError,
        429 => ErrorKind::RateLimited,
        400 | 404 => ErrorKind::BadRequest,
        s if (500..600).contains(&s) => ErrorKind::ServerError,
        _ => ErrorKind::ServerError,
    };
    GatewayError::new(kind, message)
}
