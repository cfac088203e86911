//! Request and response bodies for the diagnosis HTTP surface

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// POST /diagnose request body (JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    /// Free-text description of the fault
    pub symptoms: String,
    #[serde(default)]
    pub equipment_name: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
    /// Arbitrary telemetry forwarded verbatim to the model
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl DiagnosisRequest {
    pub fn new(symptoms: impl Into<String>) -> Self {
        Self {
            symptoms: symptoms.into(),
            ..Self::default()
        }
    }
}

/// POST /diagnose response body (JSON)
///
/// `diagnosis` is whatever JSON object the model produced, or the degraded
/// `{error, raw}` shape when its output could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResponse {
    pub diagnosis: Map<String, Value>,
    pub raw_output: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
    pub dependencies: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}
