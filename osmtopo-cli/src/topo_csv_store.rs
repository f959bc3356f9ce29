//! CSV-backed stand-in for the topology store contract.
//!
//! The real backend is a SQL-capable store (`r_nodes`/`r_ways`, GIST and
//! B-tree indexes, a `geographic_length` UPDATE) and is an external
//! collaborator this crate doesn't own - wiring a concrete database
//! driver is not this binary's job any more than PBF parsing is. What
//! the CLI *can* do without inventing a database dependency the pack
//! never reaches for is write the same two tables as CSV, one row per
//! record, in the same spirit as `CsvAddressSink`. A real deployment
//! swaps this sink for a Postgres/PostGIS-backed `TopologyStore` impl;
//! the trait boundary is exactly where that swap happens.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::Writer;
use geo::HaversineLength;
use osmtopo_common::{Error, Result};
use osmtopo_core::model::{TopologyEdge, TopologyNode};
use osmtopo_core::store::TopologyStore;

const NODE_HEADER: [&str; 4] = ["id", "lon", "lat", "wkt"];
const WAY_HEADER: [&str; 11] = [
    "id", "id_osm", "type", "source", "target", "lon1", "lat1", "lon2", "lat2", "name", "length",
];

pub struct CsvTopologyStore {
    dir: PathBuf,
    nodes: Writer<BufWriter<File>>,
    ways: Writer<BufWriter<File>>,
}

impl CsvTopologyStore {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut nodes = Writer::from_writer(BufWriter::new(File::create(dir.join("r_nodes.csv"))?));
        nodes
            .write_record(NODE_HEADER)
            .map_err(|e| Error::Csv(e.to_string()))?;

        let mut ways = Writer::from_writer(BufWriter::new(File::create(dir.join("r_ways.csv"))?));
        ways.write_record(WAY_HEADER).map_err(|e| Error::Csv(e.to_string()))?;

        Ok(Self { dir, nodes, ways })
    }
}

impl TopologyStore for CsvTopologyStore {
    fn bootstrap(&mut self) -> Result<()> {
        // Files were already truncated by `File::create` in `create`;
        // the real backend's "drop+create" schema bootstrap has no CSV
        // analogue beyond that.
        Ok(())
    }

    fn insert_nodes(&mut self, nodes: &[TopologyNode]) -> Result<()> {
        for node in nodes {
            self.nodes
                .write_record([
                    node.id.to_string(),
                    node.lon.to_string(),
                    node.lat.to_string(),
                    format!("POINT({} {})", node.lon, node.lat),
                ])
                .map_err(|e| Error::Csv(e.to_string()))?;
        }
        Ok(())
    }

    fn insert_edges(&mut self, edges: &[TopologyEdge]) -> Result<()> {
        for edge in edges {
            let length_m = edge.linestring.haversine_length();
            self.ways
                .write_record([
                    edge.id.to_string(),
                    edge.osm_id.to_string(),
                    edge.highway_code.to_string(),
                    edge.source.to_string(),
                    edge.target.to_string(),
                    edge.lon1.to_string(),
                    edge.lat1.to_string(),
                    edge.lon2.to_string(),
                    edge.lat2.to_string(),
                    edge.name.clone(),
                    length_m.to_string(),
                ])
                .map_err(|e| Error::Csv(e.to_string()))?;
        }
        Ok(())
    }

    /// A no-op: unlike the real store's single post-load `UPDATE`, this
    /// sink computes each edge's length inline in `insert_edges`, since
    /// a CSV writer is append-only and can't rewrite an already-written
    /// row. Kept on the trait so callers don't need to know which.
    fn populate_lengths(&mut self) -> Result<()> {
        Ok(())
    }

    fn create_indexes(&mut self) -> Result<()> {
        self.nodes.flush()?;
        self.ways.flush()?;
        tracing::info!(dir = %self.dir.display(), "wrote r_nodes.csv / r_ways.csv (no index step for a CSV sink)");
        Ok(())
    }
}
