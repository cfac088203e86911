//! Prompt rendering for diagnosis requests

use crate::models::DiagnosisRequest;

/// Placeholder used when the caller does not name the equipment
pub const EQUIPMENT_NOT_INFORMED: &str = "not informed";

/// Output fields the model is asked to fill, with the one-line description
/// rendered into the prompt.
pub const DIAGNOSIS_FIELDS: &[(&str, &str)] = &[
    ("summary", "concise summary of the problem"),
    ("probable_causes", "list of objects {cause: string, likelihood: number 0-100}"),
    ("severity", "one of low|medium|high|critical"),
    ("recommended_actions", "ordered list of corrective steps"),
    ("troubleshooting_steps", "step-by-step list for confirming the diagnosis"),
    ("estimated_parts", "list of parts or part numbers likely needed"),
    ("estimated_time_hours", "approximate number of hours for the repair"),
    ("confidence", "number between 0 and 1"),
    ("required_tools", "list of tools"),
    ("recommended_tests", "list of tests to perform"),
    ("logs_needed", "list of logs or measurements to collect"),
    ("component", "most likely component (e.g. motor, pump, PLC, sensor)"),
    ("category", "one of mechanical|electrical|software|sensor"),
    ("maintenance_priority", "integer 1-5"),
];

const ROLE_FRAMING: &str = "You are an experienced industrial maintenance engineer. \
Given the symptoms below, produce a single JSON object with exactly these fields:";

const JSON_ONLY_INSTRUCTION: &str =
    "Return ONLY the JSON object, with no explanatory text before or after it.";

/// Render the model prompt for a request.
///
/// Layout is fixed: equipment header, optional machine id, role framing,
/// field list, JSON-only instruction, `SYMPTOMS:` block, optional `METADATA:` block.
pub fn build_prompt(request: &DiagnosisRequest) -> String {
    let equipment = non_blank(request.equipment_name.as_deref()).unwrap_or(EQUIPMENT_NOT_INFORMED);

    let mut lines: Vec<String> = Vec::with_capacity(DIAGNOSIS_FIELDS.len() + 8);
    lines.push(format!("Equipment: {}", equipment));

    if let Some(machine_id) = non_blank(request.machine_id.as_deref()) {
        lines.push(format!("Machine ID: {}", machine_id));
    }

    lines.push(ROLE_FRAMING.to_string());
    for (name, description) in DIAGNOSIS_FIELDS {
        lines.push(format!("- {}: {}", name, description));
    }
    lines.push(JSON_ONLY_INSTRUCTION.to_string());
    lines.push("SYMPTOMS:".to_string());
    lines.push(request.symptoms.clone());

    if let Some(metadata) = request.metadata.as_ref().filter(|m| !m.is_empty()) {
        // serde_json writes non-ASCII characters as-is
        match serde_json::to_string(metadata) {
            Ok(rendered) => {
                lines.push("METADATA:".to_string());
                lines.push(rendered);
            }
            Err(e) => tracing::warn!("Skipping unserializable metadata: {}", e),
        }
    }

    lines.join("\n")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
