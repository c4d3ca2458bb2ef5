//! Database layer - document store backends

pub mod memory;
pub mod metrics;
pub mod store;
pub mod traits;

pub use memory::InMemoryDocumentStore;
pub use metrics::MetricsRepository;
pub use store::PostgresDocumentStore;
pub use traits::DocumentStore;
