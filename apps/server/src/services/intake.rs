//! Intake gateway: parse, validate, stamp and publish inbound documents.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::{
    models::{
        document::{VALIDATION_STATUS_FIELD, VALIDATION_TIMESTAMP_FIELD},
        iso_timestamp, ClinicalDocument, StoredRecord, ValidationStatus,
    },
    queue::{MessageId, MessageQueue, OutboundMessage, PATIENT_ID_ATTRIBUTE},
    services::validation::validate,
    Error, Result,
};

/// Proof that a document was accepted and queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeReceipt {
    pub message_id: MessageId,
    pub queue: String,
    pub patient_id: String,
}

impl IntakeReceipt {
    /// Response body returned to the submitting client.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "message": "RDA accepted for processing",
            "messageId": self.message_id,
            "queue": self.queue,
        })
    }
}

pub struct IntakeGateway {
    queue: Option<Arc<dyn MessageQueue>>,
}

impl IntakeGateway {
    /// `None` means no queue is configured; every valid submission then fails to publish.
    pub fn new(queue: Option<Arc<dyn MessageQueue>>) -> Self {
        Self { queue }
    }

    /// Accept a raw request body.
    ///
    /// Fails with `MalformedInput` before validation when the body is not JSON, with
    /// `ValidationFailure` when structural rules are violated, and with `PublishFailure` when
    /// the queue is missing or rejects the message. Nothing is queued unless `Ok` is returned.
    #[tracing::instrument(name = "intake.submit", skip_all, fields(body_bytes = raw_body.len()))]
    pub async fn submit(&self, raw_body: &[u8]) -> Result<IntakeReceipt> {
        let result = self.accept(raw_body).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(e) => e.kind(),
        };
        crate::metrics::INTAKE_SUBMISSIONS_TOTAL
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn accept(&self, raw_body: &[u8]) -> Result<IntakeReceipt> {
        let mut doc: JsonValue =
            serde_json::from_slice(raw_body).map_err(|e| Error::MalformedInput(e.to_string()))?;

        let report = validate(&doc);
        if !report.valid {
            for error in &report.errors {
                crate::metrics::VALIDATION_ERRORS_TOTAL
                    .with_label_values(&[error_label(error)])
                    .inc();
            }
            tracing::info!(errors = ?report.errors, "Document rejected");
            return Err(Error::ValidationFailure(report.errors));
        }

        // Reject here what the worker could never store, so no 202 is issued for it
        if let Err(e) = StoredRecord::check_storable(&doc) {
            crate::metrics::VALIDATION_ERRORS_TOTAL
                .with_label_values(&["unstorable_number"])
                .inc();
            tracing::info!(error = %e, "Document rejected");
            return Err(Error::ValidationFailure(vec![e.to_string()]));
        }

        stamp(&mut doc);
        let patient_id = ClinicalDocument::new(&doc).patient_id();

        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| Error::PublishFailure("queue not configured".into()))?;

        let message = OutboundMessage::new(doc.to_string())
            .with_attribute(PATIENT_ID_ATTRIBUTE, patient_id.clone());
        let message_id = queue
            .send(message)
            .await
            .map_err(|e| Error::PublishFailure(e.to_string()))?;

        crate::metrics::QUEUE_MESSAGES_SENT_TOTAL
            .with_label_values(&[queue.name()])
            .inc();
        tracing::info!(%message_id, patient_id = %patient_id, "Document accepted");

        Ok(IntakeReceipt {
            message_id,
            queue: queue.name().to_string(),
            patient_id,
        })
    }
}

/// Add the validation stamp. Only called on documents that passed validation, which are
/// always objects.
fn stamp(doc: &mut JsonValue) {
    if let Some(fields) = doc.as_object_mut() {
        fields.insert(
            VALIDATION_TIMESTAMP_FIELD.to_string(),
            JsonValue::String(iso_timestamp(Utc::now())),
        );
        fields.insert(
            VALIDATION_STATUS_FIELD.to_string(),
            JsonValue::String(ValidationStatus::Validated.as_str().to_string()),
        );
    }
}

/// Bounded metric label for a validation error message.
fn error_label(error: &str) -> &'static str {
    if error.starts_with("Missing required field") {
        "missing_field"
    } else if error.starts_with("resourceType") {
        "resource_type"
    } else if error.starts_with("Patient") {
        "patient"
    } else if error.starts_with("Encounter") {
        "encounter"
    } else {
        "not_an_object"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{InMemoryMessageQueue, ReceiveOptions};
    use chrono::DateTime;
    use std::time::Duration;

    const VALID: &str = r#"{"resourceType":"ClinicalDocument","patient":{"id":"P1","name":"Jane"},"encounter":{"date":"2024-01-01","facility":{"id":"F1","name":"Gen"}},"diagnosis":[]}"#;

    fn gateway() -> (IntakeGateway, Arc<InMemoryMessageQueue>) {
        let queue = Arc::new(InMemoryMessageQueue::new("rda-processing-queue"));
        (IntakeGateway::new(Some(queue.clone())), queue)
    }

    fn receive_now() -> ReceiveOptions {
        ReceiveOptions {
            wait_time: Duration::ZERO,
            ..ReceiveOptions::default()
        }
    }

    #[tokio::test]
    async fn valid_document_is_stamped_and_queued() {
        let (gateway, queue) = gateway();
        let receipt = gateway.submit(VALID.as_bytes()).await.unwrap();
        assert_eq!(receipt.patient_id, "P1");
        assert_eq!(receipt.queue, "rda-processing-queue");

        let messages = queue.receive(&receive_now()).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id, receipt.message_id);
        assert_eq!(messages[0].attribute(PATIENT_ID_ATTRIBUTE), Some("P1"));

        let body: JsonValue = serde_json::from_str(&messages[0].body).unwrap();
        assert_eq!(body["validation_status"], "VALIDATED");
        let stamped = body["validation_timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamped).is_ok());
        assert_eq!(body["patient"]["name"], "Jane");
    }

    #[tokio::test]
    async fn numbers_without_exact_decimal_form_are_rejected() {
        let (gateway, queue) = gateway();
        let body = VALID.replace(r#""diagnosis":[]"#, r#""diagnosis":[{"ratio":1e-30}]"#);
        let err = gateway.submit(body.as_bytes()).await.unwrap_err();

        match err {
            Error::ValidationFailure(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("1e-30"), "{errors:?}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(queue.depth().await.unwrap().visible, 0);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_validation() {
        let (gateway, queue) = gateway();
        let err = gateway.submit(b"{not json").await.unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
        assert_eq!(queue.depth().await.unwrap().visible, 0);
    }

    #[tokio::test]
    async fn invalid_document_never_reaches_the_queue() {
        let (gateway, queue) = gateway();
        let body = VALID.replace("ClinicalDocument", "Other");
        let err = gateway.submit(body.as_bytes()).await.unwrap_err();

        match err {
            Error::ValidationFailure(errors) => {
                assert_eq!(errors, vec!["resourceType must be 'ClinicalDocument'"])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(queue.depth().await.unwrap().visible, 0);
    }

    #[tokio::test]
    async fn unconfigured_queue_is_a_publish_failure() {
        let gateway = IntakeGateway::new(None);
        let err = gateway.submit(VALID.as_bytes()).await.unwrap_err();
        assert!(matches!(err, Error::PublishFailure(_)));
    }

    #[tokio::test]
    async fn numeric_patient_id_becomes_text_attribute() {
        let (gateway, queue) = gateway();
        let body = VALID.replace(r#""id":"P1""#, r#""id":42"#);
        let receipt = gateway.submit(body.as_bytes()).await.unwrap();
        assert_eq!(receipt.patient_id, "42");

        let messages = queue.receive(&receive_now()).await.unwrap();
        assert_eq!(messages[0].attribute(PATIENT_ID_ATTRIBUTE), Some("42"));
    }

    #[test]
    fn receipt_body_names_message_and_queue() {
        let receipt = IntakeReceipt {
            message_id: MessageId::new(),
            queue: "q".into(),
            patient_id: "P1".into(),
        };
        let body = receipt.to_json();
        assert_eq!(body["message"], "RDA accepted for processing");
        assert_eq!(body["queue"], "q");
        assert_eq!(body["messageId"], receipt.message_id.to_string());
    }
}
