use serde_json::Value;

use crate::providers::error::{ProviderError, Result};

/// Normalizes a chat-completions `message.content` value into text.
///
/// Plain strings are trimmed. Arrays of `{ "text": ... }` fragments are joined
/// with newlines, skipping blank fragments.
pub fn extract_message_content(content: &Value) -> Result<String> {
    match content {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>();
            if parts.is_empty() {
                return Err(ProviderError::content("array content had no text parts"));
            }
            Ok(parts.join("\n").trim().to_string())
        }
        other => Err(ProviderError::content(format!(
            "unsupported content type {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
