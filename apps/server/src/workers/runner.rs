//! Worker runner: the poll, process, acknowledge loop

use super::base::{Worker, WorkerConfig, WorkerEvent, WorkerState};
use crate::{
    queue::{MessageQueue, ReceiveOptions, ReceivedMessage},
    Error, Result,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::watch, time::sleep};

/// Outcome of one received batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub received: usize,
    pub processed: usize,
    pub errors: usize,
}

/// Totals over the lifetime of a runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub batches: u64,
    pub processed: u64,
    pub errors: u64,
}

impl WorkerStats {
    pub fn record(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.processed += report.processed as u64;
        self.errors += report.errors as u64;
    }
}

/// Process messages one after another. A failed message never stops the batch.
pub async fn process_batch(worker: &dyn Worker, messages: &[ReceivedMessage]) -> BatchReport {
    let mut report = BatchReport {
        received: messages.len(),
        ..BatchReport::default()
    };

    for message in messages {
        match worker.process_message(message).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                report.errors += 1;
                tracing::error!(
                    message_id = %message.message_id,
                    error_kind = e.kind(),
                    "{} failed to process message: {}",
                    worker.name(),
                    e
                );
            }
        }
    }

    crate::metrics::WORKER_BATCHES_TOTAL.inc();
    crate::metrics::WORKER_BATCH_SIZE.observe(report.received as f64);
    report
}

/// Receive one batch and process it. A failing receive is a `ChannelFailure`.
pub async fn poll_once(
    worker: &dyn Worker,
    queue: &dyn MessageQueue,
    options: &ReceiveOptions,
) -> Result<BatchReport> {
    let messages = queue
        .receive(options)
        .await
        .map_err(|e| Error::ChannelFailure(e.to_string()))?;

    if messages.is_empty() {
        return Ok(BatchReport::default());
    }
    Ok(process_batch(worker, &messages).await)
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Run a worker until shutdown is requested or the queue cannot be polled.
///
/// Shutdown is honoured while waiting on the queue or sleeping between polls; a batch that
/// has been received is always processed to the end first.
pub async fn run_worker(
    worker: Arc<dyn Worker>,
    queue: Arc<dyn MessageQueue>,
    config: WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<WorkerStats> {
    tracing::info!(
        queue = queue.name(),
        batch_size = config.receive.batch_limit(),
        wait_time_seconds = config.receive.bounded_wait().as_secs(),
        poll_interval_seconds = config.poll_interval.as_secs(),
        "{} starting to poll",
        worker.name()
    );

    worker.start().await?;

    let mut state = WorkerState::Polling;
    let mut stats = WorkerStats::default();

    loop {
        // A dropped sender counts as a shutdown request
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            state = state.transition(WorkerEvent::ShutdownRequested);
        }
        if state.is_terminal() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => continue,
            received = queue.receive(&config.receive) => received,
        };

        let messages = match received {
            Ok(messages) => messages,
            Err(e) => {
                state = state.transition(WorkerEvent::ChannelFailed);
                tracing::error!(state = ?state, "{} cannot poll the queue: {}", worker.name(), e);
                worker.stop().await?;
                return Err(Error::ChannelFailure(e.to_string()));
            }
        };

        state = state.transition(WorkerEvent::MessagesReceived(messages.len()));
        if state == WorkerState::ProcessingBatch {
            let report = process_batch(worker.as_ref(), &messages).await;
            stats.record(&report);
            tracing::info!(
                received = report.received,
                processed = report.processed,
                errors = report.errors,
                total_processed = stats.processed,
                total_errors = stats.errors,
                "Batch complete"
            );
            state = state.transition(WorkerEvent::BatchCompleted);
        } else {
            tracing::debug!("No messages available");
        }

        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {}
            _ = sleep(config.poll_interval) => {}
        }
    }

    tracing::info!(
        batches = stats.batches,
        processed = stats.processed,
        errors = stats.errors,
        "{} shutdown requested, stopping...",
        worker.name()
    );
    worker.stop().await?;
    Ok(stats)
}
