//! `osmtopo`: the command-line driver wiring an `osmpbf`-backed
//! [`PbfSource`](osmtopo_core::pbf::PbfSource) to the Topology Builder and
//! Address Resolver engines.
//!
//! CLI parsing, DB credential handling and CSV serialization are
//! deliberately kept out of `osmtopo-core` - this binary is the
//! external collaborator that supplies them around the two pipeline
//! engines.

mod config;
mod csv_sink;
mod source;
mod topo_csv_store;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use osmtopo_common::Stats;
use osmtopo_core::address;
use osmtopo_core::nodemap::{NodeCacheBackend, NodeCoordMap};
use osmtopo_core::topology::{self, TopologyBuilderConfig, CHUNK_SIZE};

use config::{AddressRunConfig, TopoRunConfig};
use csv_sink::CsvAddressSink;
use source::OsmpbfSource;
use topo_csv_store::CsvTopologyStore;

#[derive(Parser)]
#[command(name = "osmtopo")]
#[command(about = "Routable topology and address extraction from OpenStreetMap PBF extracts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a routable street topology from highway ways (Way Splitter
    /// + Topology Builder).
    TopoImport {
        /// Input OSM PBF file.
        #[arg(long)]
        pbf: PathBuf,

        /// Maximum edge length in meters; omitted disables the Way
        /// Splitter entirely (each accepted way becomes one edge).
        #[arg(long)]
        max_meters: Option<f64>,

        /// Use the fully in-memory node cache instead of the file-backed
        /// sparse array.
        #[arg(long)]
        cache_mem: bool,

        /// Directory the `r_nodes.csv`/`r_ways.csv` stand-in store writes
        /// to (see `topo_csv_store`: a real SQL-capable backend is an
        /// external collaborator this crate doesn't own).
        #[arg(long, default_value = "topo-out")]
        output_path: PathBuf,

        /// Batch size for store writes.
        #[arg(long, default_value_t = CHUNK_SIZE)]
        chunk_size: usize,

        /// Connection string for a real topology store. Accepted for
        /// flag-surface parity with a full deployment; credential
        /// handling itself is out of scope for this binary, so this is
        /// only logged, never parsed or dialed.
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Build the enriched address table (Extractor -> Geometry Matcher
    /// -> Street Matcher -> Area Resolver).
    AddressImport {
        /// Input OSM PBF file.
        #[arg(long)]
        pbf: PathBuf,

        /// Use the fully in-memory node cache instead of the file-backed
        /// sparse array for the reader's own geometry-assembly cache.
        #[arg(long)]
        cache_mem: bool,

        /// CSV output path for the resolved address table.
        #[arg(long)]
        output_path: PathBuf,
    },
}

fn install_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// The topology pipeline's own intersection bookkeeping (`node_map`) and
/// `OsmpbfSource`'s internal geometry-assembly cache are two independent
/// `NodeCoordMap`s that happen to share a backend *kind* (one
/// `--cache-mem` flag picks both); give them distinct file names so a
/// `SparseFile` backend never has two map instances truncating the same
/// file out from under each other.
fn cache_backend(cache_mem: bool, scratch_dir: &std::path::Path, label: &str) -> NodeCacheBackend {
    if cache_mem {
        NodeCacheBackend::InMemory
    } else {
        NodeCacheBackend::SparseFile {
            path: scratch_dir.join(format!("osmtopo-nodemap-{label}.bin")),
        }
    }
}

fn run_topo_import(
    pbf: PathBuf,
    max_meters: Option<f64>,
    cache_mem: bool,
    output_path: PathBuf,
    chunk_size: usize,
    db_url: Option<String>,
) -> Result<()> {
    if !pbf.exists() {
        anyhow::bail!("input PBF file does not exist: {}", pbf.display());
    }
    if let Some(url) = &db_url {
        tracing::info!(
            db_url = %url,
            "a db-url was supplied, but this build has no SQL driver wired up \
             (the relational topology store is an external collaborator); \
             writing the CSV stand-in instead"
        );
    }

    std::fs::create_dir_all(&output_path)
        .with_context(|| format!("failed to create output directory {}", output_path.display()))?;

    let run_config = TopoRunConfig {
        pbf: pbf.clone(),
        max_meters,
        cache_mem,
        output_path: output_path.clone(),
        chunk_size,
    };
    tracing::debug!(
        run_config = %serde_json::to_string(&run_config).unwrap_or_default(),
        "resolved topo-import configuration"
    );

    let source = OsmpbfSource::with_cache_backend(&pbf, cache_backend(cache_mem, &output_path, "reader"));
    let mut node_map = NodeCoordMap::new(&cache_backend(cache_mem, &output_path, "builder"))
        .context("failed to initialize the topology builder's node-coordinate map")?;
    let mut store = CsvTopologyStore::create(&output_path)
        .with_context(|| format!("failed to open topology store at {}", output_path.display()))?;
    let mut stats = Stats::new();
    let config = TopologyBuilderConfig {
        max_meters,
        chunk_size,
    };

    let started = Instant::now();
    tracing::info!(pbf = %pbf.display(), max_meters = ?max_meters, "starting topology build");

    topology::build(&source, &mut node_map, &mut store, &config, &mut stats)
        .context("topology build failed")?;

    tracing::info!(elapsed = ?started.elapsed(), stats = %stats, "topology build finished");
    Ok(())
}

fn run_address_import(pbf: PathBuf, cache_mem: bool, output_path: PathBuf) -> Result<()> {
    if !pbf.exists() {
        anyhow::bail!("input PBF file does not exist: {}", pbf.display());
    }
    let scratch_dir = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let run_config = AddressRunConfig {
        pbf: pbf.clone(),
        cache_mem,
        output_path: output_path.clone(),
    };
    tracing::debug!(
        run_config = %serde_json::to_string(&run_config).unwrap_or_default(),
        "resolved address-import configuration"
    );

    let source = OsmpbfSource::with_cache_backend(&pbf, cache_backend(cache_mem, &scratch_dir, "reader"));
    let mut sink = CsvAddressSink::create(&output_path)
        .with_context(|| format!("failed to open address CSV output at {}", output_path.display()))?;
    let mut stats = Stats::new();

    let started = Instant::now();
    tracing::info!(pbf = %pbf.display(), "starting address resolution");

    address::run(&source, &mut sink, &mut stats).context("address resolution failed")?;

    tracing::info!(elapsed = ?started.elapsed(), stats = %stats, "address resolution finished");
    Ok(())
}

fn main() -> ExitCode {
    install_tracing();
    // `try_parse` rather than `parse`: a bad flag combination should exit
    // with code 1, not clap's own default of 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::TopoImport {
            pbf,
            max_meters,
            cache_mem,
            output_path,
            chunk_size,
            db_url,
        } => run_topo_import(pbf, max_meters, cache_mem, output_path, chunk_size, db_url),
        Commands::AddressImport {
            pbf,
            cache_mem,
            output_path,
        } => run_address_import(pbf, cache_mem, output_path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "osmtopo failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
