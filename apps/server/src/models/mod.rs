//! Domain models for the RDA pipeline

pub mod document;
pub mod record;
pub mod value;

pub use document::{ClinicalDocument, EncounterRef, FacilityRef, PatientRef};
pub use record::{iso_timestamp, RecordKey, StoredRecord, ValidationStatus};
pub use value::{normalize, AttributeValue, NormalizeError};
