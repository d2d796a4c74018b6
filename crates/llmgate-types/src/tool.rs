use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A tool the model may call, declared up front on a request. Names are
/// unique within a request (enforced by `ToolRegistry`/callers, not here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for `arguments`.
    pub parameters: JsonValue,
    #[serde(default)]
    pub required: Vec<String>,
}

/// How the caller wants the model to use the declared tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Specific { name: String },
}

/// A model-emitted request to invoke a named tool with structured arguments.
/// Invariant (enforced by the orchestrator, not this type): `name` refers to
/// a declared `ToolDefinition` and `arguments` validates against its schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: JsonValue,
}

/// Minimal JSON Schema validator covering the subset `ToolDefinition::parameters`
/// is documented to use: object type, `required`, and per-property `type`.
/// Intentionally not a general-purpose schema validator.
pub fn validate_arguments(def: &ToolDefinition, arguments: &JsonValue) -> Result<(), String> {
    let JsonValue::Object(args) = arguments else {
        return Err("arguments must be a JSON object".to_string());
    };

    let mut problems = Vec::new();
    for name in &def.required {
        if !args.contains_key(name) {
            problems.push(format!("'{name}' missing"));
        }
    }

    if let Some(properties) = def.parameters.get("properties").and_then(JsonValue::as_object) {
        for (name, value) in args {
            let Some(expected_type) = properties
                .get(name)
                .and_then(|prop| prop.get("type"))
                .and_then(JsonValue::as_str)
            else {
                continue;
            };
            if !json_type_matches(value, expected_type) {
                problems.push(format!("'{name}' not {expected_type}"));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("schema validation failed: {}", problems.join("; ")))
    }
}

fn json_type_matches(value: &JsonValue, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_tool() -> ToolDefinition {
        ToolDefinition {
            name: "add".to_string(),
            description: "adds two integers".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer"},
                    "b": {"type": "integer"},
                },
                "required": ["a", "b"],
            }),
            required: vec!["a".to_string(), "b".to_string()],
        }
    }

    #[test]
    fn valid_arguments_pass() {
        let tool = add_tool();
        assert!(validate_arguments(&tool, &json!({"a": 2, "b": 3})).is_ok());
    }

    #[test]
    fn missing_and_wrong_typed_fields_are_reported() {
        let tool = add_tool();
        let err = validate_arguments(&tool, &json!({"a": "two"})).unwrap_err();
        assert!(err.contains("'b' missing"));
        assert!(err.contains("'a' not integer"));
    }
}
