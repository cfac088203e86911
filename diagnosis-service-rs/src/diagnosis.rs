//! JSON diagnosis extraction from raw model text

use serde_json::{Map, Value};

/// Message placed in the degraded payload when model output is not JSON
pub const UNPARSABLE_DIAGNOSIS_MESSAGE: &str = "could not parse model output as JSON";

#[derive(Debug, thiserror::Error)]
pub enum DiagnosisError {
    #[error("Unparsable diagnosis: no JSON object found in {length} bytes of model output")]
    Unparsable { length: usize },
}

/// Parse a single JSON object out of model text.
///
/// Tries the whole text first, then the slice between the first `{` and the
/// last `}`. Nothing else is repaired.
pub fn extract_json(text: &str) -> Result<Map<String, Value>, DiagnosisError> {
    if let Some(object) = parse_object(text) {
        return Ok(object);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Some(object) = parse_object(&text[start..=end]) {
                tracing::debug!("Recovered JSON object from bytes {}..={} of model output", start, end);
                return Ok(object);
            }
        }
    }

    Err(DiagnosisError::Unparsable { length: text.len() })
}

/// Payload returned in place of a diagnosis when extraction fails
pub fn degraded_payload(raw: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("error".to_string(), Value::String(UNPARSABLE_DIAGNOSIS_MESSAGE.to_string()));
    payload.insert("raw".to_string(), Value::String(raw.to_string()));
    payload
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
