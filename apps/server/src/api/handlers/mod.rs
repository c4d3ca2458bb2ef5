//! Request handlers for API endpoints
//!
//! Handlers extract request parts, call into services and let `Error` render failures.

pub mod intake;
pub mod metrics;
pub mod ops;
pub mod query;

pub use intake::*;
pub use metrics::*;
pub use ops::*;
pub use query::*;
