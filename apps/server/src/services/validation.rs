//! Structural validation of inbound documents.
//!
//! Only field presence and shape are checked. Every rule runs; errors accumulate in a fixed
//! order (required fields, `resourceType`, `patient`, `encounter`).

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::models::document::CLINICAL_DOCUMENT;

/// Top-level keys every document must carry, in reporting order.
pub const REQUIRED_FIELDS: [&str; 4] = ["resourceType", "patient", "encounter", "diagnosis"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check the structure of a parsed document. Pure; never fails.
pub fn validate(doc: &JsonValue) -> ValidationReport {
    let Some(fields) = doc.as_object() else {
        return ValidationReport::from_errors(vec![format!(
            "RDA must be an object, got {}",
            json_type_name(doc)
        )]);
    };

    let mut errors = Vec::new();

    for field in REQUIRED_FIELDS {
        if !fields.contains_key(field) {
            errors.push(format!("Missing required field: {field}"));
        }
    }

    if fields.get("resourceType").and_then(JsonValue::as_str) != Some(CLINICAL_DOCUMENT) {
        errors.push(format!("resourceType must be '{CLINICAL_DOCUMENT}'"));
    }

    if let Some(patient) = fields.get("patient") {
        check_sub_document(patient, "Patient", ["id", "name"], &mut errors);
    }

    if let Some(encounter) = fields.get("encounter") {
        check_sub_document(encounter, "Encounter", ["date", "facility"], &mut errors);
    }

    ValidationReport::from_errors(errors)
}

fn check_sub_document(
    value: &JsonValue,
    label: &str,
    required: [&str; 2],
    errors: &mut Vec<String>,
) {
    match value.as_object() {
        None => errors.push(format!("{label} must be an object")),
        Some(fields) if !has_keys(fields, &required) => errors.push(format!(
            "{label} must have '{}' and '{}'",
            required[0], required[1]
        )),
        Some(_) => {}
    }
}

fn has_keys(fields: &Map<String, JsonValue>, keys: &[&str]) -> bool {
    keys.iter().all(|key| fields.contains_key(*key))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
