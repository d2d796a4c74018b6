use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Role of a single `Message` in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn in a conversation, carrying an ordered list of content parts.
///
/// `tool_call_id` is only meaningful (and required by convention) when
/// `role == Role::Tool`: it identifies which `ToolCall` this message is the
/// result of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::Text(text.into())],
            tool_call_id: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text(text.into())],
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentPart::Text(text.into())],
            tool_call_id: None,
        }
    }

    /// Builds the tool-role message an orchestrator injects after executing
    /// a tool call.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let call_id = call_id.into();
        Self {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult {
                call_id: call_id.clone(),
                content: content.into(),
            }],
            tool_call_id: Some(call_id),
        }
    }

    /// Concatenates all `text` parts, ignoring other content kinds. Useful
    /// for adapters that only need the textual content of a message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// The source of an inline or referenced media blob (image/video/audio/file).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// Bytes provided directly by the caller, base64-encoded on the wire.
    Inline { mime_type: String, data: String },
    /// A URI the provider can fetch directly (or that a prior upload produced).
    Uri { mime_type: Option<String>, uri: String },
    /// A local filesystem path that an adapter must upload before referencing.
    /// Left unresolved until an upload step runs; adapters that cannot upload
    /// reject this variant with `UnsupportedFeature`.
    LocalPath { mime_type: Option<String>, path: String },
}

/// One piece of message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text(String),
    Image(MediaSource),
    Video(MediaSource),
    Audio(MediaSource),
    File(MediaSource),
    ToolCall {
        id: String,
        name: String,
        arguments: JsonValue,
    },
    ToolResult {
        call_id: String,
        content: String,
    },
    /// Provider-emitted internal reasoning. Opaque to every other component;
    /// carried through so callers can log or discard it, never interpreted.
    Thought(String),
}

impl ContentPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_multimodal(&self) -> bool {
        matches!(
            self,
            ContentPart::Image(_) | ContentPart::Video(_) | ContentPart::Audio(_) | ContentPart::File(_)
        )
    }
}
