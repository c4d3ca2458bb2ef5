//! Query router: map a read request onto one of the store's access patterns.
//!
//! Precedence, first match wins:
//! 1. `patient_id` and `encounter_id` in the path: point lookup
//! 2. `patient_id` in the path: all records of the patient
//! 3. `facility_id` query parameter: facility index
//! 4. otherwise: bounded scan

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::{
    db::DocumentStore,
    models::{RecordKey, StoredRecord},
    Error, Result,
};

/// Recognised query-string parameters. Unknown parameters are ignored; a repeated
/// `facility_id` is ambiguous and rejected by deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryParams {
    pub facility_id: Option<String>,
}

impl QueryParams {
    pub fn facility(facility_id: impl Into<String>) -> Self {
        Self {
            facility_id: Some(facility_id.into()),
        }
    }
}

/// Selectors taken from the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSelector {
    pub patient_id: Option<String>,
    pub encounter_id: Option<String>,
}

impl PathSelector {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn patient(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            encounter_id: None,
        }
    }

    pub fn record(patient_id: impl Into<String>, encounter_id: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            encounter_id: Some(encounter_id.into()),
        }
    }
}

/// The access pattern chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordQuery {
    Item(RecordKey),
    Patient(String),
    Facility(String),
    Scan { limit: usize },
}

impl RecordQuery {
    pub fn resolve(
        path: PathSelector,
        params: &QueryParams,
        scan_limit: usize,
    ) -> Self {
        match (path.patient_id, path.encounter_id) {
            (Some(patient_id), Some(encounter_id)) => {
                RecordQuery::Item(RecordKey::new(patient_id, encounter_id))
            }
            (Some(patient_id), None) => RecordQuery::Patient(patient_id),
            _ => match &params.facility_id {
                Some(facility_id) => RecordQuery::Facility(facility_id.clone()),
                None => RecordQuery::Scan { limit: scan_limit },
            },
        }
    }

    /// Metric label.
    pub fn route_name(&self) -> &'static str {
        match self {
            RecordQuery::Item(_) => "item",
            RecordQuery::Patient(_) => "patient",
            RecordQuery::Facility(_) => "facility",
            RecordQuery::Scan { .. } => "scan",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Item(StoredRecord),
    /// Point lookup miss. An expected outcome, not a failure.
    NotFound(RecordKey),
    Patient {
        patient_id: String,
        items: Vec<StoredRecord>,
    },
    Facility {
        facility_id: String,
        items: Vec<StoredRecord>,
    },
    Scan {
        limit: usize,
        items: Vec<StoredRecord>,
    },
}

impl QueryOutcome {
    pub fn items(&self) -> &[StoredRecord] {
        match self {
            QueryOutcome::Item(record) => std::slice::from_ref(record),
            QueryOutcome::NotFound(_) => &[],
            QueryOutcome::Patient { items, .. }
            | QueryOutcome::Facility { items, .. }
            | QueryOutcome::Scan { items, .. } => items,
        }
    }

    /// Response body. A miss becomes `Error::NotFound`.
    pub fn into_json(self) -> Result<JsonValue> {
        Ok(match self {
            QueryOutcome::Item(record) => json!({ "item": record }),
            QueryOutcome::NotFound(key) => return Err(Error::NotFound(key.to_string())),
            QueryOutcome::Patient { items, .. } => json!({
                "count": items.len(),
                "items": items,
            }),
            QueryOutcome::Facility { facility_id, items } => json!({
                "count": items.len(),
                "facility_id": facility_id,
                "items": items,
            }),
            QueryOutcome::Scan { limit, items } => json!({
                "count": items.len(),
                "items": items,
                "note": format!("Limited to {limit} items"),
            }),
        })
    }
}

pub struct QueryRouter {
    store: Arc<dyn DocumentStore>,
    scan_limit: usize,
}

impl QueryRouter {
    pub fn new(store: Arc<dyn DocumentStore>, scan_limit: usize) -> Self {
        Self { store, scan_limit }
    }

    pub async fn route(
        &self,
        path: PathSelector,
        params: &QueryParams,
    ) -> Result<QueryOutcome> {
        let request = RecordQuery::resolve(path, params, self.scan_limit);
        let route = request.route_name();

        let result = self.execute(request).await;

        let status = match &result {
            Ok(QueryOutcome::NotFound(_)) => "not_found",
            Ok(_) => "ok",
            Err(_) => "error",
        };
        crate::metrics::QUERY_REQUESTS_TOTAL
            .with_label_values(&[route, status])
            .inc();
        if let Ok(outcome) = &result {
            crate::metrics::QUERY_RESULTS
                .with_label_values(&[route])
                .observe(outcome.items().len() as f64);
            tracing::debug!(route, count = outcome.items().len(), "Query routed");
        }

        result
    }

    async fn execute(&self, request: RecordQuery) -> Result<QueryOutcome> {
        Ok(match request {
            RecordQuery::Item(key) => match self.store.get(&key).await? {
                Some(record) => QueryOutcome::Item(record),
                None => QueryOutcome::NotFound(key),
            },
            RecordQuery::Patient(patient_id) => {
                let items = self.store.query_by_patient(&patient_id).await?;
                QueryOutcome::Patient { patient_id, items }
            }
            RecordQuery::Facility(facility_id) => {
                let items = self.store.query_by_facility(&facility_id).await?;
                QueryOutcome::Facility { facility_id, items }
            }
            RecordQuery::Scan { limit } => QueryOutcome::Scan {
                limit,
                items: self.store.scan(limit).await?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDocumentStore;
    use chrono::Utc;


    async fn seeded_router(scan_limit: usize) -> QueryRouter {
        let store = Arc::new(InMemoryDocumentStore::new());
        for (patient, encounter, facility, date) in [
            ("P1", "E2", "F1", "2024-02-01"),
            ("P1", "E1", "F2", "2024-01-01"),
            ("P2", "E1", "F1", "2024-01-15"),
        ] {
            let doc = json!({
                "patient": {"id": patient, "name": "Jane"},
                "encounter": {"id": encounter, "date": date, "facility": {"id": facility}},
            });
            let record = StoredRecord::from_document(&doc, || "unused".into(), Utc::now()).unwrap();
            store.upsert(&record).await.unwrap();
        }
        QueryRouter::new(store, scan_limit)
    }

    #[test]
    fn point_lookup_wins_over_facility_parameter() {
        let request = RecordQuery::resolve(
            PathSelector::record("P1", "E1"),
            &QueryParams::facility("F1"),
            100,
        );
        assert_eq!(request, RecordQuery::Item(RecordKey::new("P1", "E1")));
    }

    #[test]
    fn patient_path_wins_over_facility_parameter() {
        let request = RecordQuery::resolve(
            PathSelector::patient("P1"),
            &QueryParams::facility("F1"),
            100,
        );
        assert_eq!(request, RecordQuery::Patient("P1".into()));
    }

    #[test]
    fn facility_parameter_and_scan_fallback() {
        assert_eq!(
            RecordQuery::resolve(PathSelector::none(), &QueryParams::facility("F1"), 100),
            RecordQuery::Facility("F1".into())
        );
        assert_eq!(
            RecordQuery::resolve(PathSelector::none(), &QueryParams::default(), 100),
            RecordQuery::Scan { limit: 100 }
        );
    }

    #[tokio::test]
    async fn point_lookup_returns_item_or_not_found() {
        let router = seeded_router(100).await;

        let hit = router
            .route(PathSelector::record("P1", "E1"), &QueryParams::default())
            .await
            .unwrap();
        let body = hit.into_json().unwrap();
        assert_eq!(body["item"]["encounter_id"], "E1");

        let miss = router
            .route(PathSelector::record("P1", "E9"), &QueryParams::default())
            .await
            .unwrap();
        assert!(matches!(miss, QueryOutcome::NotFound(_)));
        assert!(matches!(miss.into_json(), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn patient_query_counts_in_key_order() {
        let router = seeded_router(100).await;
        let body = router
            .route(PathSelector::patient("P1"), &QueryParams::default())
            .await
            .unwrap()
            .into_json()
            .unwrap();

        assert_eq!(body["count"], 2);
        assert_eq!(body["items"][0]["encounter_id"], "E1");
        assert_eq!(body["items"][1]["encounter_id"], "E2");
        assert!(body.get("note").is_none());
    }

    #[tokio::test]
    async fn facility_query_is_ordered_by_date() {
        let router = seeded_router(100).await;
        let body = router
            .route(PathSelector::none(), &QueryParams::facility("F1"))
            .await
            .unwrap()
            .into_json()
            .unwrap();

        assert_eq!(body["count"], 2);
        assert_eq!(body["facility_id"], "F1");
        assert_eq!(body["items"][0]["encounter_date"], "2024-01-15");
        assert_eq!(body["items"][1]["encounter_date"], "2024-02-01");
    }

    #[tokio::test]
    async fn scan_is_capped_and_annotated() {
        let router = seeded_router(2).await;
        let body = router
            .route(PathSelector::none(), &QueryParams::default())
            .await
            .unwrap()
            .into_json()
            .unwrap();

        assert_eq!(body["count"], 2);
        assert_eq!(body["note"], "Limited to 2 items");
    }
}
