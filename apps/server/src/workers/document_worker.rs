//! Document worker: turns queued documents into stored records

use super::base::Worker;
use crate::{
    db::DocumentStore,
    models::StoredRecord,
    queue::{MessageId, MessageQueue, ReceivedMessage},
    Error, Result,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;

/// Encounter id used when a document carries none. Derived from the message id, so every
/// redelivery of one message upserts the same record while distinct messages never collide.
pub fn synthetic_encounter_id(message_id: &MessageId) -> String {
    format!("ENC-{}", message_id.0.simple())
}

pub struct DocumentWorker {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn MessageQueue>,
}

impl DocumentWorker {
    pub fn new(store: Arc<dyn DocumentStore>, queue: Arc<dyn MessageQueue>) -> Self {
        Self { store, queue }
    }

    fn count_error(reason: &str) {
        crate::metrics::WORKER_MESSAGE_ERRORS_TOTAL
            .with_label_values(&[reason])
            .inc();
    }

    async fn store_and_acknowledge(&self, message: &ReceivedMessage) -> Result<StoredRecord> {
        let body: JsonValue = serde_json::from_str(&message.body).map_err(|e| {
            Self::count_error("parse");
            Error::Processing(format!("message body is not valid JSON: {e}"))
        })?;

        let record = StoredRecord::from_document(
            &body,
            || synthetic_encounter_id(&message.message_id),
            Utc::now(),
        )
        .map_err(|e| {
            Self::count_error("normalize");
            Error::Processing(e.to_string())
        })?;

        if let Err(e) = self.store.upsert(&record).await {
            Self::count_error("store_write");
            crate::metrics::STORE_WRITES_TOTAL
                .with_label_values(&["failed"])
                .inc();
            return Err(Error::Processing(format!(
                "store write failed for {}: {e}",
                record.key()
            )));
        }
        crate::metrics::STORE_WRITES_TOTAL
            .with_label_values(&["ok"])
            .inc();
        tracing::info!(key = %record.key(), "Stored record");

        // Acknowledge only after the write succeeded
        self.queue
            .delete(&message.receipt_handle)
            .await
            .inspect_err(|_| Self::count_error("acknowledge"))?;

        Ok(record)
    }
}

#[async_trait]
impl Worker for DocumentWorker {
    fn name(&self) -> &str {
        "DocumentWorker"
    }

    async fn start(&self) -> Result<()> {
        tracing::info!("{} starting...", self.name());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        tracing::info!("{} stopping...", self.name());
        Ok(())
    }

    #[tracing::instrument(
        name = "worker.process_message",
        skip_all,
        fields(message_id = %message.message_id, receive_count = message.receive_count)
    )]
    async fn process_message(&self, message: &ReceivedMessage) -> Result<()> {
        let start = Instant::now();
        let result = self.store_and_acknowledge(message).await;
        crate::metrics::WORKER_MESSAGE_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());

        let status = if result.is_ok() { "processed" } else { "error" };
        crate::metrics::WORKER_MESSAGES_TOTAL
            .with_label_values(&[status])
            .inc();

        result.map(|_| ())
    }
}
