//! soma-core: weekly Federal Reserve SOMA summary holdings.
//!
//! Fetch one summary per week, keep an append-only wide table, derive a
//! long (tidy) table and a columnar snapshot, and validate both tables.

pub mod analytics;
pub mod calendar;
pub mod config;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod table;
pub mod types;
pub mod validate;
