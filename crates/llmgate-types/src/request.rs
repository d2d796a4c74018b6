use crate::generation::GenerationConfig;
use crate::message::Message;
use crate::tool::{ToolChoice, ToolDefinition};

/// The canonical request envelope every adapter translates into a
/// provider-specific wire request.
#[derive(Debug, Clone, Default)]
pub struct LLMRequest {
    pub messages: Vec<Message>,
    pub config: GenerationConfig,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
}

impl LLMRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: GenerationConfig::default(),
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }
}
