//! Best-effort text extraction from generative model responses
//!
//! Upstream response bodies are not stable across providers and API versions,
//! so the text is located by running an ordered chain of probes over the raw
//! JSON value. The first probe yielding non-blank text wins; if none does, the
//! whole value is rendered as a string. Extraction never fails.

use serde_json::Value;

type Probe = fn(&Value) -> Option<String>;

/// Probe order matters: `candidates` (Gemini) before the generic keys,
/// `choices` (OpenAI-compatible) after them.
const PROBES: &[(&str, Probe)] = &[
    ("candidates", from_candidates),
    ("output", from_output),
    ("content", from_content),
    ("message", from_message),
    ("choices", from_choices),
    ("output_text", from_output_text),
    ("text", from_text),
];

/// Extract the answer text from a model response value
pub fn extract_text(response: &Value) -> String {
    if let Value::String(text) = response {
        return text.clone();
    }

    PROBES
        .iter()
        .find_map(|(name, probe)| {
            let text = probe(response).filter(|t| !t.trim().is_empty())?;
            tracing::trace!("response text matched probe '{}'", name);
            Some(text)
        })
        .unwrap_or_else(|| render(response))
}

fn from_candidates(response: &Value) -> Option<String> {
    let first = response.get("candidates")?.as_array()?.first()?;

    if first.is_object() {
        entry_text(first, "content")
            .or_else(|| entry_text(first, "text"))
            .or_else(|| entry_text(first, "output"))
            .or_else(|| Some(render(first)))
    } else {
        Some(text_of(first).unwrap_or_else(|| render(first)))
    }
}

fn from_output(response: &Value) -> Option<String> {
    entry_text(response, "output")
}

fn from_content(response: &Value) -> Option<String> {
    entry_text(response, "content")
}

fn from_message(response: &Value) -> Option<String> {
    let message = present(response.get("message")?)?;

    if message.is_object() {
        entry_text(message, "content")
            .or_else(|| entry_text(message, "text"))
            .or_else(|| Some(render(message)))
    } else {
        Some(render(message))
    }
}

fn from_choices(response: &Value) -> Option<String> {
    let first = response.get("choices")?.as_array()?.first()?;

    first
        .get("message")
        .and_then(|m| entry_text(m, "content"))
        .or_else(|| entry_text(first, "content"))
}

fn from_output_text(response: &Value) -> Option<String> {
    entry_text(response, "output_text")
}

fn from_text(response: &Value) -> Option<String> {
    entry_text(response, "text")
}

/// Text held under `key`, rendering non-textual values rather than dropping them
fn entry_text(value: &Value, key: &str) -> Option<String> {
    let entry = present(value.get(key)?)?;
    Some(text_of(entry).unwrap_or_else(|| render(entry)))
}

/// Textual reading of a value.
///
/// Strings are taken as-is. Content objects (`{"parts": [{"text": ...}]}`)
/// and content arrays (`[{"type": "text", "text": ...}]`) have their text
/// pieces concatenated.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let pieces: Vec<String> = items.iter().filter_map(text_of).collect();
            if pieces.is_empty() {
                None
            } else {
                Some(pieces.concat())
            }
        }
        Value::Object(map) => {
            if let Some(parts) = map.get("parts") {
                return text_of(parts);
            }
            map.get("text").and_then(Value::as_str).map(str::to_string)
        }
        _ => None,
    }
}

fn present(value: &Value) -> Option<&Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
