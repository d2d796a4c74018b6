//! Canonical types shared across the gateway: messages, generation config,
//! tool declarations, responses, model identifiers, and the error taxonomy.

pub mod error;
pub mod generation;
pub mod message;
pub mod model_id;
pub mod request;
pub mod response;
pub mod tool;

pub use error::{ErrorKind, GatewayError};
pub use generation::{GenerationConfig, ResponseFormat, SafetySettings};
pub use message::{ContentPart, MediaSource, Message, Role};
pub use model_id::{ModelId, ModelIdError};
pub use request::LLMRequest;
pub use response::{CodeExecutionResult, FinishReason, LLMResponse, UsageInfo};
pub use tool::{ToolCall, ToolChoice, ToolDefinition, validate_arguments};
