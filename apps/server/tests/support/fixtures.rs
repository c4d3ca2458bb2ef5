use anyhow::Context as _;
use axum::body::Bytes;
use serde_json::{json, Value};

/// A document that passes intake validation.
pub fn rda(patient_id: &str, encounter_id: &str, facility_id: &str, date: &str) -> Value {
    json!({
        "resourceType": "ClinicalDocument",
        "patient": {
            "id": patient_id,
            "name": "Jane Doe",
            "birthDate": "1980-02-01",
            "gender": "female"
        },
        "encounter": {
            "id": encounter_id,
            "date": date,
            "facility": {"id": facility_id, "name": "General Hospital"}
        },
        "diagnosis": [{"code": "E11.9", "display": "Type 2 diabetes"}],
        "medications": [{"name": "metformin", "dose": "500mg"}]
    })
}

/// Valid document whose encounter carries no id.
pub fn rda_without_encounter_id(patient_id: &str) -> Value {
    json!({
        "resourceType": "ClinicalDocument",
        "patient": {"id": patient_id, "name": "Jane Doe"},
        "encounter": {"date": "2024-05-01", "facility": {"id": "F1"}},
        "diagnosis": []
    })
}

pub fn to_json_body(value: &Value) -> anyhow::Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

pub fn parse_json(body: &[u8]) -> anyhow::Result<Value> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).context("response body is JSON")
}
