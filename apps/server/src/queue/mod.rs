//! Message queue abstraction between intake and the worker
//!
//! Provides a trait-based interface for an at-least-once message channel with PostgreSQL and
//! in-memory implementations. The PostgreSQL queue uses LISTEN/NOTIFY to cut long-poll latency.

mod helpers;
mod memory;
mod models;
mod postgres;
mod traits;

pub use helpers::*;
pub use memory::InMemoryMessageQueue;
pub use models::*;
pub use postgres::PostgresMessageQueue;
pub use traits::MessageQueue;
