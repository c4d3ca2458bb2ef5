//! Business logic layer

pub mod intake;
pub mod metrics;
pub mod query;
pub mod validation;

pub use intake::{IntakeGateway, IntakeReceipt};
pub use metrics::MetricsService;
pub use query::{PathSelector, QueryOutcome, QueryParams, QueryRouter, RecordQuery};
pub use validation::{validate, ValidationReport};
