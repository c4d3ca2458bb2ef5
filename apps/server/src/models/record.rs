//! Persisted record model

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use super::document::ClinicalDocument;
use super::value::{normalize, AttributeValue, NormalizeError};

/// Status stamped on a document as it moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// Passed structural validation at intake.
    Validated,
    /// Stored without an intake stamp.
    Processed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Validated => "VALIDATED",
            ValidationStatus::Processed => "PROCESSED",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "VALIDATED" => Some(ValidationStatus::Validated),
            "PROCESSED" => Some(ValidationStatus::Processed),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite primary key. One processing event for one patient.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub patient_id: String,
    pub encounter_id: String,
}

impl RecordKey {
    pub fn new(patient_id: impl Into<String>, encounter_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            encounter_id: encounter_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.patient_id, self.encounter_id)
    }
}

/// A processed document as held by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub patient_id: String,
    pub encounter_id: String,
    pub facility_id: String,
    pub facility_name: String,
    pub encounter_date: String,
    pub patient_name: String,
    pub patient_birth_date: String,
    pub patient_gender: String,
    pub diagnosis: Vec<AttributeValue>,
    pub medications: Vec<AttributeValue>,
    pub resource_type: String,
    pub validation_timestamp: String,
    pub validation_status: ValidationStatus,
    pub processing_timestamp: String,
    /// The full enriched document exactly as received from the queue.
    pub raw_data: String,
}

impl StoredRecord {
    /// Build a record from a parsed queue message body.
    ///
    /// Missing fields take the defaults documented on [`ClinicalDocument`]. `encounter_id`
    /// supplies the identifier used when the document has no `encounter.id`; `encounter_date`
    /// falls back to `processed_at`. Fails only when a numeric leaf has no exact decimal form.
    pub fn from_document(
        body: &JsonValue,
        encounter_id: impl FnOnce() -> String,
        processed_at: DateTime<Utc>,
    ) -> Result<Self, NormalizeError> {
        let doc = ClinicalDocument::new(body);
        let processing_timestamp = iso_timestamp(processed_at);

        let diagnosis = doc
            .diagnosis()
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()?;
        let medications = doc
            .medications()
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patient_id: doc.patient_id(),
            encounter_id: doc.encounter_id(encounter_id),
            facility_id: doc.facility_id(),
            facility_name: doc.facility_name(),
            encounter_date: doc.encounter_date(|| processing_timestamp.clone()),
            patient_name: doc.patient_name(),
            patient_birth_date: doc.patient_birth_date(),
            patient_gender: doc.patient_gender(),
            diagnosis,
            medications,
            resource_type: doc.resource_type(),
            validation_timestamp: doc.validation_timestamp(),
            validation_status: doc.validation_status(),
            processing_timestamp,
            raw_data: body.to_string(),
        })
    }

    /// Fails when a `diagnosis` or `medications` number has no exact decimal form, i.e. when
    /// [`StoredRecord::from_document`] would reject the document.
    pub fn check_storable(body: &JsonValue) -> Result<(), NormalizeError> {
        let doc = ClinicalDocument::new(body);
        doc.diagnosis()
            .into_iter()
            .chain(doc.medications())
            .try_for_each(|value| normalize(value).map(|_| ()))
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.patient_id.clone(), self.encounter_id.clone())
    }
}

/// ISO-8601 UTC with microseconds, the timestamp format used on documents and records.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
