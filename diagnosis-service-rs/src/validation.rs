//! Diagnosis request validation
//!
//! Requests are checked in order: content type, body parse, schema, then
//! field rules the schema cannot express. Every failure maps to a JSON
//! error body with a 4xx status.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};

use crate::models::{DiagnosisRequest, ErrorResponse};

/// Maximum request payload size (1MB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

lazy_static::lazy_static! {
    /// Schema for POST /diagnose
    pub static ref DIAGNOSE_REQUEST_SCHEMA: JSONSchema = {
        let schema = json!({
            "type": "object",
            "required": ["symptoms"],
            "properties": {
                "symptoms": {
                    "type": "string",
                    "minLength": 1
                },
                "equipment_name": {
                    "type": ["string", "null"],
                    "maxLength": 256
                },
                "machine_id": {
                    "type": ["string", "null"],
                    "maxLength": 128
                },
                "metadata": {
                    "type": ["object", "null"]
                }
            }
        });

        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .expect("Invalid schema")
    };
}

/// Validation error for API requests
#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Schema validation failed")]
    Schema(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl ApiValidationError {
    /// Convert to HTTP status code and error response
    pub fn to_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status = match self {
            Self::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidFormat(_) | Self::Schema(_) | Self::MissingField(_) => StatusCode::BAD_REQUEST,
        };

        let details = match self {
            Self::Schema(errors) => Some(errors.clone()),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
                details,
            }),
        )
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "'{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Parse a raw request body as JSON
pub fn parse_json_body(body: &[u8]) -> Result<Value, ApiValidationError> {
    if body.len() > MAX_PAYLOAD_SIZE {
        return Err(ApiValidationError::PayloadTooLarge(format!(
            "Payload size ({} bytes) exceeds maximum allowed size ({} bytes)",
            body.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let text = std::str::from_utf8(body)
        .map_err(|_| ApiValidationError::InvalidFormat("Request body is not valid UTF-8".to_string()))?;

    serde_json::from_str::<Value>(text.trim())
        .map_err(|e| ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e)))
}

/// Validate a JSON payload against the diagnose schema
pub fn validate_json_schema(json: &Value) -> Result<(), ApiValidationError> {
    if let Err(errors) = DIAGNOSE_REQUEST_SCHEMA.validate(json) {
        let details: Vec<String> = errors
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{} at {}", err, path)
                }
            })
            .collect();
        return Err(ApiValidationError::Schema(details));
    }

    Ok(())
}

/// Validate a diagnose payload and convert it into a request
pub fn validate_diagnose_request(payload: Value) -> Result<DiagnosisRequest, ApiValidationError> {
    if payload.get("symptoms").map_or(true, Value::is_null) {
        return Err(ApiValidationError::MissingField("symptoms".to_string()));
    }

    validate_json_schema(&payload)?;

    let request: DiagnosisRequest = serde_json::from_value(payload)
        .map_err(|e| ApiValidationError::InvalidFormat(e.to_string()))?;

    if request.symptoms.trim().is_empty() {
        return Err(ApiValidationError::MissingField("symptoms".to_string()));
    }

    Ok(request)
}

/// Generate middleware config for payload limits
pub fn payload_limit_config() -> tower_http::limit::RequestBodyLimitLayer {
    tower_http::limit::RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_validate_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json; charset=utf-8"));

        assert!(validate_content_type(&headers, "application/json").is_ok());
        assert!(validate_content_type(&headers, "application/xml").is_err());
        assert!(validate_content_type(&HeaderMap::new(), "application/json").is_err());
    }

    #[test]
    fn test_validate_json_schema() {
        let valid = json!({
            "symptoms": "motor overheating",
            "equipment_name": null,
            "metadata": {"rpm": 1750}
        });
        let wrong_type = json!({"symptoms": 12});
        let bad_metadata = json!({"symptoms": "x", "metadata": [1, 2]});

        assert!(validate_json_schema(&valid).is_ok());
        assert!(validate_json_schema(&wrong_type).is_err());
        assert!(validate_json_schema(&bad_metadata).is_err());
    }

    #[test]
    fn test_validate_diagnose_request() {
        let request = validate_diagnose_request(json!({
            "symptoms": "pump leaking",
            "machine_id": "P-7",
            "extra": "ignored"
        }))
        .unwrap();
        assert_eq!(request.symptoms, "pump leaking");
        assert_eq!(request.machine_id.as_deref(), Some("P-7"));
        assert!(request.equipment_name.is_none());

        let missing = validate_diagnose_request(json!({"equipment_name": "pump"})).unwrap_err();
        assert!(matches!(missing, ApiValidationError::MissingField(_)));

        let blank = validate_diagnose_request(json!({"symptoms": "   "})).unwrap_err();
        assert!(matches!(blank, ApiValidationError::MissingField(_)));

        let not_object = validate_diagnose_request(json!(["symptoms"])).unwrap_err();
        assert!(matches!(not_object, ApiValidationError::MissingField(_)));
    }

    #[test]
    fn test_parse_json_body() {
        assert!(parse_json_body(br#" {"symptoms": "noise"} "#).is_ok());
        assert!(matches!(
            parse_json_body(br#"{"symptoms": "#),
            Err(ApiValidationError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_json_body(&[0xff, 0xfe]),
            Err(ApiValidationError::InvalidFormat(_))
        ));

        let large = vec![b' '; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            parse_json_body(&large),
            Err(ApiValidationError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_error_responses() {
        let (status, Json(body)) = ApiValidationError::ContentType("x".to_string()).to_response();
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body.code, 415);

        let (status, Json(body)) =
            ApiValidationError::Schema(vec!["bad".to_string()]).to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.details, Some(vec!["bad".to_string()]));
    }
}
