//! Shared error types and stats counters for the osmtopo toolkit.

pub mod error;
pub mod stats;

pub use error::{Error, Result};
pub use stats::Stats;
