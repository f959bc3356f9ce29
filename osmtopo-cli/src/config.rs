//! Resolved run configuration.
//!
//! Flags come from `clap`; defaults live here. Each config struct is
//! `serde::Serialize` only so it can be logged as structured JSON at
//! startup - a future `--config run.toml` load would deserialize into
//! the same shape, but nothing here reads a config file yet.

use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TopoRunConfig {
    pub pbf: PathBuf,
    pub max_meters: Option<f64>,
    pub cache_mem: bool,
    pub output_path: PathBuf,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressRunConfig {
    pub pbf: PathBuf,
    pub cache_mem: bool,
    pub output_path: PathBuf,
}
