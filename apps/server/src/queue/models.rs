//! Queue domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::config::QueueConfig;

/// Upper bound on messages returned by a single receive call.
pub const MAX_RECEIVE_BATCH: usize = 10;

/// Upper bound on a single long-poll wait.
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// Message attribute carrying the patient id of the enclosed document.
pub const PATIENT_ID_ATTRIBUTE: &str = "PatientId";

/// Queue-assigned message id, stable across redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-delivery token used to acknowledge a message. Superseded by every redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub Uuid);

impl ReceiptHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReceiptHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

impl OutboundMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// One delivery of a message.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    pub body: String,
    pub attributes: BTreeMap<String, String>,
    /// 1 on first delivery, incremented on every redelivery.
    pub receive_count: i32,
    pub sent_at: DateTime<Utc>,
}

impl ReceivedMessage {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Parameters of a single receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: usize,
    pub wait_time: Duration,
    pub visibility_timeout: Duration,
}

impl ReceiveOptions {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_messages: config.batch_size,
            wait_time: Duration::from_secs(config.wait_time_seconds),
            visibility_timeout: Duration::from_secs(config.visibility_timeout_seconds),
        }
    }

    /// `max_messages` clamped to `1..=MAX_RECEIVE_BATCH`.
    pub fn batch_limit(&self) -> usize {
        self.max_messages.clamp(1, MAX_RECEIVE_BATCH)
    }

    /// `wait_time` clamped to [`MAX_WAIT_TIME`].
    pub fn bounded_wait(&self) -> Duration {
        self.wait_time.min(MAX_WAIT_TIME)
    }
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// Approximate queue size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    /// Messages available for delivery.
    pub visible: i64,
    /// Messages received but neither acknowledged nor timed out.
    pub in_flight: i64,
}
