//! Background worker that consumes the document queue
//!
//! The worker polls the queue in batches, stores each document as a record and acknowledges
//! the message only after the write succeeded.

mod base;
mod document_worker;
mod runner;

pub use base::{Worker, WorkerConfig, WorkerEvent, WorkerState};
pub use document_worker::{synthetic_encounter_id, DocumentWorker};
pub use runner::{poll_once, process_batch, run_worker, BatchReport, WorkerStats};
