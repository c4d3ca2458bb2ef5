//! In-memory message queue
//!
//! Same visibility semantics as the PostgreSQL queue, scoped to a single process. Used by tests
//! and by the `memory` backend.

use super::models::{
    MessageId, OutboundMessage, QueueDepth, ReceiptHandle, ReceiveOptions, ReceivedMessage,
};
use super::traits::MessageQueue;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
struct Entry {
    id: MessageId,
    body: String,
    attributes: BTreeMap<String, String>,
    sent_at: DateTime<Utc>,
    visible_at: Instant,
    receipt: Option<ReceiptHandle>,
    receive_count: i32,
}

/// Process-local queue backed by a mutex-protected deque
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    name: String,
    entries: Mutex<VecDeque<Entry>>,
    notify: Notify,
}

impl InMemoryMessageQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<Entry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("in-memory queue lock poisoned".into()))
    }

    /// Claim visible messages. When none are visible, returns the instant the next hidden
    /// message becomes visible again, if any.
    fn claim(
        &self,
        options: &ReceiveOptions,
    ) -> Result<(Vec<ReceivedMessage>, Option<Instant>)> {
        let now = Instant::now();
        let limit = options.batch_limit();
        let mut entries = self.lock()?;

        let mut claimed = Vec::new();
        for entry in entries.iter_mut() {
            if claimed.len() == limit {
                break;
            }
            if entry.visible_at > now {
                continue;
            }

            let receipt = ReceiptHandle::new();
            entry.receipt = Some(receipt);
            entry.receive_count += 1;
            entry.visible_at = now + options.visibility_timeout;

            claimed.push(ReceivedMessage {
                message_id: entry.id,
                receipt_handle: receipt,
                body: entry.body.clone(),
                attributes: entry.attributes.clone(),
                receive_count: entry.receive_count,
                sent_at: entry.sent_at,
            });
        }

        let next_visible = if claimed.is_empty() {
            entries.iter().map(|e| e.visible_at).min()
        } else {
            None
        };

        Ok((claimed, next_visible))
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: OutboundMessage) -> Result<MessageId> {
        let id = MessageId::new();
        self.lock()?.push_back(Entry {
            id,
            body: message.body,
            attributes: message.attributes,
            sent_at: Utc::now(),
            visible_at: Instant::now(),
            receipt: None,
            receive_count: 0,
        });
        self.notify.notify_one();
        Ok(id)
    }

    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<ReceivedMessage>> {
        let deadline = Instant::now() + options.bounded_wait();

        loop {
            let (messages, next_visible) = self.claim(options)?;
            if !messages.is_empty() || Instant::now() >= deadline {
                return Ok(messages);
            }

            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
        let mut entries = self.lock()?;
        let position = entries
            .iter()
            .position(|e| e.receipt.as_ref() == Some(receipt))
            .ok_or_else(|| Error::Queue(format!("receipt handle {receipt} is stale or unknown")))?;
        entries.remove(position);
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth> {
        let now = Instant::now();
        let entries = self.lock()?;
        let visible = entries.iter().filter(|e| e.visible_at <= now).count() as i64;
        Ok(QueueDepth {
            visible,
            in_flight: entries.len() as i64 - visible,
        })
    }
}
