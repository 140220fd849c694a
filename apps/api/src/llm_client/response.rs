//! Repairs applied to raw LLM text before JSON parsing.
//!
//! Each repair is a pure `&str -> &str` transform that returns its input
//! unchanged when its pattern is absent, so they compose in any order.

use serde_json::{Map, Value};

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
/// Only a fence that both opens and closes the text is removed.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_suffix("```") else {
        return text;
    };
    if let Some(stripped) = inner.strip_prefix("```json") {
        stripped.trim()
    } else if let Some(stripped) = inner.strip_prefix("```") {
        stripped.trim()
    } else {
        text
    }
}

/// Collapses an erroneous doubled-brace wrapping: `{{...}}` becomes `{...}`.
/// A valid JSON object never begins with `{{`, so this cannot damage good output.
pub fn unwrap_doubled_braces(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with("{{") && text.ends_with("}}") {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Parses repaired text and requires a top-level JSON object.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::de::Error::custom(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Returns the keys from `required` that `object` lacks, in `required` order.
pub fn missing_keys<'a>(object: &Map<String, Value>, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect()
}

/// First `max_chars` characters of `text`, for logging raw responses.
pub fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
