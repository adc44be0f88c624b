use serde::Deserialize;
use serde_json::Value;

/// Union of the event fields observed across the four backend stream
/// dialects, so each line needs exactly one decode.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnifiedEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    // codex
    pub thread_id: String,
    /// Decoded lazily; only `item.completed` events look inside.
    pub item: Option<Value>,

    // claude
    pub subtype: String,
    pub session_id: String,
    pub result: String,

    // gemini
    pub role: String,
    pub content: String,
    pub delta: Option<bool>,
    pub status: String,

    // opencode (camelCase sessionID)
    #[serde(rename = "sessionID")]
    pub opencode_session_id: String,
    pub part: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpencodePart {
    #[serde(rename = "type")]
    pub part_type: String,
    pub text: String,
    pub reason: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

impl UnifiedEvent {
    pub fn item_type(&self) -> &str {
        self.item
            .as_ref()
            .and_then(|i| i.get("type"))
            .and_then(|t| t.as_str())
            .unwrap_or("")
    }
}

/// Flattens a codex `item.text` value: either a plain string or an array of
/// strings joined in order. Anything else normalizes to empty.
pub fn normalize_text(text: &Value) -> String {
    match text {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .concat(),
        _ => String::new(),
    }
}
