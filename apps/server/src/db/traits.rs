//! Core trait for document store backends

use crate::{
    models::{RecordKey, StoredRecord},
    Result,
};
use async_trait::async_trait;

/// Storage trait for processed documents
///
/// Records are keyed by `(patient_id, encounter_id)` and indexed a second time by
/// `(facility_id, encounter_date)`. Any backend (PostgreSQL, in-memory, a test fake) can
/// implement this trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a record, or overwrite the one with the same key
    async fn upsert(&self, record: &StoredRecord) -> Result<()>;

    /// Point lookup by composite key
    ///
    /// # Returns
    /// * `Ok(Some(record))` - Record found
    /// * `Ok(None)` - No record under this key
    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>>;

    /// All records of one patient, ordered by `encounter_id`
    async fn query_by_patient(&self, patient_id: &str) -> Result<Vec<StoredRecord>>;

    /// All records of one facility, ordered by `encounter_date`
    async fn query_by_facility(&self, facility_id: &str) -> Result<Vec<StoredRecord>>;

    /// Up to `limit` records in no particular order
    async fn scan(&self, limit: usize) -> Result<Vec<StoredRecord>>;

    /// Total number of records
    async fn count(&self) -> Result<i64>;
}
