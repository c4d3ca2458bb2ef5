//! Queue trait definition

use super::models::{
    MessageId, OutboundMessage, QueueDepth, ReceiptHandle, ReceiveOptions, ReceivedMessage,
};
use crate::Result;
use async_trait::async_trait;

/// At-least-once message channel
///
/// A received message stays hidden from other consumers for the visibility timeout and is
/// delivered again, with a fresh receipt handle, unless it is deleted first.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Queue name, as reported to clients
    fn name(&self) -> &str;

    /// Publish a message
    async fn send(&self, message: OutboundMessage) -> Result<MessageId>;

    /// Receive up to `options.batch_limit()` messages, waiting at most
    /// `options.bounded_wait()` for the first one to become available.
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledge a delivery. Fails with `Error::Queue` when the handle is stale.
    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()>;

    /// Current visible and in-flight message counts
    async fn depth(&self) -> Result<QueueDepth>;
}
