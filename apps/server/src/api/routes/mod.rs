//! Route tables

pub mod ops;
pub mod rda;
