//! Base worker trait, configuration and loop state machine

use crate::{
    config::Config,
    queue::{ReceiveOptions, ReceivedMessage},
    Result,
};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause after every poll, whether or not messages arrived.
    pub poll_interval: Duration,
    pub receive: ReceiveOptions,
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.worker.poll_interval_seconds),
            receive: ReceiveOptions::from_config(&config.queue),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Base trait for queue consumers
#[async_trait]
pub trait Worker: Send + Sync {
    /// Get worker name for logging
    fn name(&self) -> &str;

    /// Called once before the first poll
    async fn start(&self) -> Result<()>;

    /// Called once when the loop exits
    async fn stop(&self) -> Result<()>;

    /// Process and acknowledge a single message.
    ///
    /// An error leaves the message for redelivery, unless the failure happened while
    /// acknowledging an already stored record.
    async fn process_message(&self, message: &ReceivedMessage) -> Result<()>;
}

/// Where the consumer loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Polling,
    ProcessingBatch,
    /// Interrupted from outside. Terminal.
    Stopped,
    /// The channel could not be polled. Terminal.
    Failed,
}

/// Inputs that move the consumer loop between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    MessagesReceived(usize),
    BatchCompleted,
    ShutdownRequested,
    ChannelFailed,
}

impl WorkerState {
    pub fn transition(self, event: WorkerEvent) -> WorkerState {
        use WorkerEvent::*;
        use WorkerState::*;

        match (self, event) {
            (Stopped, _) | (Failed, _) => self,
            (Polling, MessagesReceived(0)) => Polling,
            (Polling, MessagesReceived(_)) => ProcessingBatch,
            (Polling, ShutdownRequested) => Stopped,
            (Polling, ChannelFailed) => Failed,
            (ProcessingBatch, BatchCompleted) => Polling,
            // A batch always runs to completion; shutdown is honoured on the next poll
            (ProcessingBatch, ShutdownRequested) => ProcessingBatch,
            (state, _) => state,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }
}
