//! PostgreSQL document store
//!
//! One row per composite key. The full record is kept as JSONB; the key and index columns are
//! duplicated into plain text columns. JSONB stores numbers as `numeric`, so decimal values
//! keep their exact text.

use super::traits::DocumentStore;
use crate::models::{RecordKey, StoredRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
    table: String,
}

impl PostgresDocumentStore {
    /// `table` must be a validated identifier; it is interpolated into SQL.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the record table and the facility index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        let table = &self.table;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                patient_id TEXT NOT NULL,
                encounter_id TEXT NOT NULL,
                facility_id TEXT NOT NULL,
                encounter_date TEXT NOT NULL,
                record JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (patient_id, encounter_id)
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_facility_idx ON {table} (facility_id, encounter_date)"
        ))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<StoredRecord> {
    let Json(record): Json<JsonValue> = row.get("record");
    serde_json::from_value(record)
        .map_err(|e| Error::Internal(format!("stored record is unreadable: {e}")))
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn upsert(&self, record: &StoredRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (patient_id, encounter_id, facility_id, encounter_date, record, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (patient_id, encounter_id) DO UPDATE
            SET facility_id = EXCLUDED.facility_id,
                encounter_date = EXCLUDED.encounter_date,
                record = EXCLUDED.record,
                updated_at = EXCLUDED.updated_at
            "#,
            self.table
        ))
        .bind(&record.patient_id)
        .bind(&record.encounter_id)
        .bind(&record.facility_id)
        .bind(&record.encounter_date)
        .bind(Json(record))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(&format!(
            "SELECT record FROM {} WHERE patient_id = $1 AND encounter_id = $2",
            self.table
        ))
        .bind(&key.patient_id)
        .bind(&key.encounter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn query_by_patient(&self, patient_id: &str) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT record FROM {}
            WHERE patient_id = $1
            ORDER BY encounter_id COLLATE "C"
            "#,
            self.table
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn query_by_facility(&self, facility_id: &str) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT record FROM {}
            WHERE facility_id = $1
            ORDER BY encounter_date COLLATE "C", patient_id COLLATE "C", encounter_id COLLATE "C"
            "#,
            self.table
        ))
        .bind(facility_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn scan(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(&format!("SELECT record FROM {} LIMIT $1", self.table))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}
