//! Topology store contract.
//!
//! The relational backend that actually persists `r_nodes`/`r_ways` is out
//! of scope here; only the narrow surface the Topology Builder drives is
//! specified, so the engine can be exercised against an in-memory double
//! in tests and wired to a real SQL store from the CLI binary.

use osmtopo_common::Result;

use crate::model::{TopologyEdge, TopologyNode};

/// Sink the Topology Builder drives through schema setup, batched writes,
/// and post-load maintenance, in that order.
pub trait TopologyStore {
    /// Drop and recreate `r_nodes`/`r_ways` (or equivalent).
    fn bootstrap(&mut self) -> Result<()>;

    /// Insert a batch of up to `CHUNK_SIZE` nodes.
    fn insert_nodes(&mut self, nodes: &[TopologyNode]) -> Result<()>;

    /// Insert a batch of up to `CHUNK_SIZE` edges.
    fn insert_edges(&mut self, edges: &[TopologyEdge]) -> Result<()>;

    /// Compute `length` for every edge from its linestring's geographic
    /// length, called once after all edges are inserted.
    fn populate_lengths(&mut self) -> Result<()>;

    /// Build the GIST geometry indexes and B-tree id indexes.
    fn create_indexes(&mut self) -> Result<()>;
}

/// In-memory double used by tests and by callers with no SQL backend
/// configured. Computes `length_m` itself rather than deferring to a
/// database function, since there's no database to defer to.
#[derive(Debug, Default)]
pub struct InMemoryTopologyStore {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    bootstrapped: bool,
    indexed: bool,
}

impl InMemoryTopologyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TopologyStore for InMemoryTopologyStore {
    fn bootstrap(&mut self) -> Result<()> {
        self.nodes.clear();
        self.edges.clear();
        self.bootstrapped = true;
        Ok(())
    }

    fn insert_nodes(&mut self, nodes: &[TopologyNode]) -> Result<()> {
        self.nodes.extend_from_slice(nodes);
        Ok(())
    }

    fn insert_edges(&mut self, edges: &[TopologyEdge]) -> Result<()> {
        self.edges.extend_from_slice(edges);
        Ok(())
    }

    fn populate_lengths(&mut self) -> Result<()> {
        use geo::HaversineLength;
        for edge in &mut self.edges {
            edge.length_m = Some(edge.linestring.haversine_length());
        }
        Ok(())
    }

    fn create_indexes(&mut self) -> Result<()> {
        self.indexed = true;
        Ok(())
    }
}
