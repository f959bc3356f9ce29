//! Error types shared by the topology and address pipelines.
//!
//! Most per-record problems (bad geometry, a missing housenumber, an
//! unknown highway type) are not modeled as `Error` at all — they are a
//! stats counter increment and a `continue`, matching the pipeline's
//! streaming, best-effort nature. `Error` is reserved for whole-pass
//! failures: a store write that can't be retried, a malformed config, or
//! an I/O failure reading the source file.

use thiserror::Error;

/// Top-level error type for the osmtopo engines.
#[derive(Debug, Error)]
pub enum Error {
    #[error("topology store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(String),
}

pub type Result<T> = std::result::Result<T, Error>;
