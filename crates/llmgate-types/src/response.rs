use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::tool::ToolCall;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// One provider-side sandboxed code execution, surfaced on Gemini-style
/// adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExecutionResult {
    pub code: String,
    pub output: String,
    pub succeeded: bool,
}

/// Canonical model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub usage: UsageInfo,
    pub finish_reason: FinishReason,
    /// The untouched provider payload, for callers that need provider-specific
    /// detail this canonical shape doesn't carry.
    pub raw: JsonValue,
    #[serde(default)]
    pub code_execution_results: Vec<CodeExecutionResult>,
    #[serde(default)]
    pub grounding_metadata: Option<JsonValue>,
}

impl LLMResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
