//! RDA clinical document pipeline
//!
//! Three cooperating pieces share this crate:
//! - an HTTP intake gateway that validates RDA documents and publishes them to a queue
//! - a worker that drains the queue and upserts normalized records into the document store
//! - a query API over the stored records
//!
//! `rda-server` runs the HTTP surface, `rda-worker` runs the queue consumer.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod request_context;
pub mod services;
pub mod signals;
pub mod state;
pub mod workers;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
