//! Typed read access to an inbound clinical document.
//!
//! Documents arrive as untrusted JSON. [`ClinicalDocument`] wraps the parsed tree and is the
//! only place that knows where each field lives and what it defaults to when missing:
//!
//! | accessor                | path                         | default              |
//! |-------------------------|------------------------------|----------------------|
//! | `patient_id`            | `patient.id`                 | `unknown`            |
//! | `patient_name`          | `patient.name`               | `unknown`            |
//! | `patient_birth_date`    | `patient.birthDate`          | `""`                 |
//! | `patient_gender`        | `patient.gender`             | `""`                 |
//! | `encounter_id`          | `encounter.id`               | caller-supplied      |
//! | `encounter_date`        | `encounter.date`             | caller-supplied      |
//! | `facility_id`           | `encounter.facility.id`      | `unknown`            |
//! | `facility_name`         | `encounter.facility.name`    | `unknown`            |
//! | `resource_type`         | `resourceType`               | `ClinicalDocument`   |
//! | `diagnosis`             | `diagnosis`                  | empty                |
//! | `medications`           | `medications`                | empty                |
//! | `validation_timestamp`  | `validation_timestamp`       | `""`                 |
//! | `validation_status`     | `validation_status`          | `PROCESSED`          |

use serde_json::{Map, Value as JsonValue};

use super::record::ValidationStatus;

pub const UNKNOWN: &str = "unknown";
pub const CLINICAL_DOCUMENT: &str = "ClinicalDocument";

/// Field names stamped onto a document by the intake gateway.
pub const VALIDATION_TIMESTAMP_FIELD: &str = "validation_timestamp";
pub const VALIDATION_STATUS_FIELD: &str = "validation_status";

/// Read-only view over a parsed document.
#[derive(Debug, Clone, Copy)]
pub struct ClinicalDocument<'a> {
    root: &'a JsonValue,
}

/// `patient` sub-document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientRef<'a> {
    fields: Option<&'a Map<String, JsonValue>>,
}

/// `encounter` sub-document.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncounterRef<'a> {
    fields: Option<&'a Map<String, JsonValue>>,
}

/// `encounter.facility` sub-document.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacilityRef<'a> {
    fields: Option<&'a Map<String, JsonValue>>,
}

impl<'a> ClinicalDocument<'a> {
    pub fn new(root: &'a JsonValue) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &'a JsonValue {
        self.root
    }

    pub fn patient(&self) -> PatientRef<'a> {
        PatientRef {
            fields: self.root.get("patient").and_then(JsonValue::as_object),
        }
    }

    pub fn encounter(&self) -> EncounterRef<'a> {
        EncounterRef {
            fields: self.root.get("encounter").and_then(JsonValue::as_object),
        }
    }

    pub fn patient_id(&self) -> String {
        self.patient().id().unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn patient_name(&self) -> String {
        self.patient().name().unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn patient_birth_date(&self) -> String {
        self.patient().birth_date().unwrap_or_default()
    }

    pub fn patient_gender(&self) -> String {
        self.patient().gender().unwrap_or_default()
    }

    /// `encounter.id`, or `fallback()` when the document has none.
    pub fn encounter_id(&self, fallback: impl FnOnce() -> String) -> String {
        self.encounter().id().unwrap_or_else(fallback)
    }

    /// `encounter.date`, or `fallback()` when the document has none.
    pub fn encounter_date(&self, fallback: impl FnOnce() -> String) -> String {
        self.encounter().date().unwrap_or_else(fallback)
    }

    pub fn facility_id(&self) -> String {
        self.encounter()
            .facility()
            .id()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn facility_name(&self) -> String {
        self.encounter()
            .facility()
            .name()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn resource_type(&self) -> String {
        scalar_text(self.root.get("resourceType")).unwrap_or_else(|| CLINICAL_DOCUMENT.to_string())
    }

    pub fn diagnosis(&self) -> Vec<&'a JsonValue> {
        sequence(self.root.get("diagnosis"))
    }

    pub fn medications(&self) -> Vec<&'a JsonValue> {
        sequence(self.root.get("medications"))
    }

    pub fn validation_timestamp(&self) -> String {
        scalar_text(self.root.get(VALIDATION_TIMESTAMP_FIELD)).unwrap_or_default()
    }

    /// Unrecognised or missing statuses read as [`ValidationStatus::Processed`].
    pub fn validation_status(&self) -> ValidationStatus {
        self.root
            .get(VALIDATION_STATUS_FIELD)
            .and_then(JsonValue::as_str)
            .and_then(ValidationStatus::from_wire)
            .unwrap_or(ValidationStatus::Processed)
    }
}

impl<'a> PatientRef<'a> {
    pub fn is_present(&self) -> bool {
        self.fields.is_some()
    }

    pub fn id(&self) -> Option<String> {
        field_text(self.fields, "id")
    }

    pub fn name(&self) -> Option<String> {
        field_text(self.fields, "name")
    }

    pub fn birth_date(&self) -> Option<String> {
        field_text(self.fields, "birthDate")
    }

    pub fn gender(&self) -> Option<String> {
        field_text(self.fields, "gender")
    }
}

impl<'a> EncounterRef<'a> {
    pub fn is_present(&self) -> bool {
        self.fields.is_some()
    }

    pub fn id(&self) -> Option<String> {
        field_text(self.fields, "id")
    }

    pub fn date(&self) -> Option<String> {
        field_text(self.fields, "date")
    }

    pub fn facility(&self) -> FacilityRef<'a> {
        FacilityRef {
            fields: self
                .fields
                .and_then(|f| f.get("facility"))
                .and_then(JsonValue::as_object),
        }
    }
}

impl<'a> FacilityRef<'a> {
    pub fn id(&self) -> Option<String> {
        field_text(self.fields, "id")
    }

    pub fn name(&self) -> Option<String> {
        field_text(self.fields, "name")
    }
}

fn field_text(fields: Option<&Map<String, JsonValue>>, key: &str) -> Option<String> {
    scalar_text(fields.and_then(|f| f.get(key)))
}

/// Strings verbatim, numbers and booleans by their JSON text. Anything else is absent.
fn scalar_text(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Arrays yield their items, `null`/missing yields nothing, any other value is a single item.
fn sequence(value: Option<&JsonValue>) -> Vec<&JsonValue> {
    match value {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_fields() {
        let doc = json!({
            "resourceType": "ClinicalDocument",
            "patient": {"id": "P1", "name": "Jane", "birthDate": "1980-02-01", "gender": "female"},
            "encounter": {"id": "E9", "date": "2024-01-01", "facility": {"id": "F1", "name": "Gen"}},
            "diagnosis": [{"code": "E11"}],
            "medications": [{"name": "metformin"}, {"name": "insulin"}],
        });
        let view = ClinicalDocument::new(&doc);

        assert_eq!(view.patient_id(), "P1");
        assert_eq!(view.patient_name(), "Jane");
        assert_eq!(view.patient_birth_date(), "1980-02-01");
        assert_eq!(view.patient_gender(), "female");
        assert_eq!(view.encounter_id(|| "fallback".into()), "E9");
        assert_eq!(view.encounter_date(|| "fallback".into()), "2024-01-01");
        assert_eq!(view.facility_id(), "F1");
        assert_eq!(view.facility_name(), "Gen");
        assert_eq!(view.resource_type(), "ClinicalDocument");
        assert_eq!(view.diagnosis().len(), 1);
        assert_eq!(view.medications().len(), 2);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let doc = json!({});
        let view = ClinicalDocument::new(&doc);

        assert_eq!(view.patient_id(), UNKNOWN);
        assert_eq!(view.patient_name(), UNKNOWN);
        assert_eq!(view.patient_birth_date(), "");
        assert_eq!(view.patient_gender(), "");
        assert_eq!(view.encounter_id(|| "ENC-x".into()), "ENC-x");
        assert_eq!(view.encounter_date(|| "now".into()), "now");
        assert_eq!(view.facility_id(), UNKNOWN);
        assert_eq!(view.facility_name(), UNKNOWN);
        assert_eq!(view.resource_type(), CLINICAL_DOCUMENT);
        assert!(view.diagnosis().is_empty());
        assert!(view.medications().is_empty());
        assert_eq!(view.validation_timestamp(), "");
        assert_eq!(view.validation_status(), ValidationStatus::Processed);
    }

    #[test]
    fn non_mapping_sub_documents_read_as_absent() {
        let doc = json!({"patient": "P1", "encounter": ["x"]});
        let view = ClinicalDocument::new(&doc);

        assert!(!view.patient().is_present());
        assert!(!view.encounter().is_present());
        assert_eq!(view.patient_id(), UNKNOWN);
        assert_eq!(view.facility_id(), UNKNOWN);
    }

    #[test]
    fn numeric_ids_are_read_as_text() {
        let doc = json!({"patient": {"id": 12345, "name": "Jane"}});
        assert_eq!(ClinicalDocument::new(&doc).patient_id(), "12345");
    }

    #[test]
    fn fallback_is_not_evaluated_when_field_present() {
        let doc = json!({"encounter": {"id": "E1"}});
        let id = ClinicalDocument::new(&doc).encounter_id(|| panic!("fallback evaluated"));
        assert_eq!(id, "E1");
    }

    #[test]
    fn scalar_diagnosis_becomes_single_entry() {
        let doc = json!({"diagnosis": "E11", "medications": null});
        let view = ClinicalDocument::new(&doc);
        assert_eq!(view.diagnosis(), vec![&json!("E11")]);
        assert!(view.medications().is_empty());
    }

    #[test]
    fn stamped_status_is_read() {
        let doc = json!({"validation_status": "VALIDATED", "validation_timestamp": "2024-01-01T00:00:00Z"});
        let view = ClinicalDocument::new(&doc);
        assert_eq!(view.validation_status(), ValidationStatus::Validated);
        assert_eq!(view.validation_timestamp(), "2024-01-01T00:00:00Z");
    }
}
