//! In-memory document store

use super::traits::DocumentStore;
use crate::models::{RecordKey, StoredRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

/// Records in a `BTreeMap`, so key order is the natural iteration order
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    records: RwLock<BTreeMap<RecordKey, StoredRecord>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<RecordKey, StoredRecord>>> {
        self.records
            .read()
            .map_err(|_| Error::Internal("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, record: &StoredRecord) -> Result<()> {
        self.records
            .write()
            .map_err(|_| Error::Internal("in-memory store lock poisoned".into()))?
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn query_by_patient(&self, patient_id: &str) -> Result<Vec<StoredRecord>> {
        Ok(self
            .read()?
            .values()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn query_by_facility(&self, facility_id: &str) -> Result<Vec<StoredRecord>> {
        let mut records: Vec<StoredRecord> = self
            .read()?
            .values()
            .filter(|r| r.facility_id == facility_id)
            .cloned()
            .collect();
        // Stable sort keeps key order among equal dates
        records.sort_by(|a, b| a.encounter_date.cmp(&b.encounter_date));
        Ok(records)
    }

    async fn scan(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        Ok(self.read()?.values().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.read()?.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationStatus;

    fn record(patient: &str, encounter: &str, facility: &str, date: &str) -> StoredRecord {
        StoredRecord {
            patient_id: patient.into(),
            encounter_id: encounter.into(),
            facility_id: facility.into(),
            facility_name: "Gen".into(),
            encounter_date: date.into(),
            patient_name: "Jane".into(),
            patient_birth_date: String::new(),
            patient_gender: String::new(),
            diagnosis: Vec::new(),
            medications: Vec::new(),
            resource_type: "ClinicalDocument".into(),
            validation_timestamp: String::new(),
            validation_status: ValidationStatus::Validated,
            processing_timestamp: "2024-01-01T00:00:00.000000Z".into(),
            raw_data: "{}".into(),
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_key() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&record("P1", "E1", "F1", "2024-01-01")).await.unwrap();

        let mut updated = record("P1", "E1", "F1", "2024-01-01");
        updated.patient_name = "Jane Doe".into();
        store.upsert(&updated).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get(&RecordKey::new("P1", "E1")).await.unwrap();
        assert_eq!(stored.map(|r| r.patient_name), Some("Jane Doe".to_string()));
    }

    #[tokio::test]
    async fn patient_query_is_in_encounter_order() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&record("P1", "E2", "F1", "2024-01-01")).await.unwrap();
        store.upsert(&record("P2", "E1", "F1", "2024-01-01")).await.unwrap();
        store.upsert(&record("P1", "E1", "F1", "2024-02-01")).await.unwrap();

        let encounters: Vec<String> = store
            .query_by_patient("P1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.encounter_id)
            .collect();
        assert_eq!(encounters, vec!["E1", "E2"]);
    }

    #[tokio::test]
    async fn facility_query_is_in_date_order() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&record("P1", "E1", "F1", "2024-03-01")).await.unwrap();
        store.upsert(&record("P2", "E1", "F1", "2024-01-01")).await.unwrap();
        store.upsert(&record("P3", "E1", "F2", "2024-02-01")).await.unwrap();

        let dates: Vec<String> = store
            .query_by_facility("F1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.encounter_date)
            .collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-03-01"]);
    }

    #[tokio::test]
    async fn scan_is_bounded() {
        let store = InMemoryDocumentStore::new();
        for i in 0..5 {
            store
                .upsert(&record(&format!("P{i}"), "E1", "F1", "2024-01-01"))
                .await
                .unwrap();
        }
        assert_eq!(store.scan(3).await.unwrap().len(), 3);
        assert!(store.get(&RecordKey::new("nobody", "E1")).await.unwrap().is_none());
    }
}
