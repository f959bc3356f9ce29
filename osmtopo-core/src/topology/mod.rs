//! Topology Builder: a two-pass pipeline over highway ways that
//! emits a routable graph of intersection nodes and (optionally split)
//! edges into a [`TopologyStore`].
//!
//! Pass 1 discovers which nodes are intersections without knowing any
//! coordinates yet; pass 2 fills in coordinates and walks each accepted
//! way's node list, breaking it at every intersection and, if a maximum
//! edge length is configured, feeding each piece through the Way
//! Splitter.

use std::collections::HashSet;

use geo::LineString;
use osmtopo_common::{Result, Stats};

use crate::model::{NodeRef, TopologyEdge, TopologyNode};
use crate::nodemap::NodeCoordMap;
use crate::pbf::{NodeEvent, PbfHandler, PbfSource, WayEvent};
use crate::splitter;
use crate::store::TopologyStore;
use crate::waymapping;

/// Default batch size for store writes.
pub const CHUNK_SIZE: usize = 2000;

pub struct TopologyBuilderConfig {
    /// `None` disables the Way Splitter entirely: each way becomes exactly one edge.
    pub max_meters: Option<f64>,
    pub chunk_size: usize,
}

impl Default for TopologyBuilderConfig {
    fn default() -> Self {
        Self {
            max_meters: None,
            chunk_size: CHUNK_SIZE,
        }
    }
}

struct Pass1Handler<'a> {
    node_map: &'a mut NodeCoordMap,
    intersections: &'a mut HashSet<NodeRef>,
    stats: &'a mut Stats,
}

impl PbfHandler for Pass1Handler<'_> {
    fn on_way(&mut self, way: WayEvent) {
        let Some(tag) = way.tags.get("highway") else {
            self.stats.bump("way_no_highway");
            return;
        };
        let Some(_code) = waymapping::classify(tag) else {
            self.stats.bump("way_filtered_highway");
            return;
        };
        if way.node_refs.len() < 2 {
            self.stats.bump("way_too_short");
            return;
        }

        for &id in &way.node_refs {
            match self.node_map.mark(id) {
                Ok(true) => {
                    self.intersections.insert(id);
                }
                Ok(false) => {}
                Err(_) => self.stats.bump("node_map_io_error"),
            }
        }
        self.intersections.insert(way.node_refs[0]);
        self.intersections.insert(*way.node_refs.last().unwrap());
        self.stats.bump("way_accepted_pass1");
    }
}

struct Pass2Handler<'a, S: TopologyStore> {
    node_map: &'a mut NodeCoordMap,
    intersections: &'a HashSet<NodeRef>,
    config: &'a TopologyBuilderConfig,
    store: &'a mut S,
    node_buffer: Vec<TopologyNode>,
    edge_buffer: Vec<TopologyEdge>,
    emitted_nodes: HashSet<NodeRef>,
    stats: &'a mut Stats,
}

impl<S: TopologyStore> Pass2Handler<'_, S> {
    fn flush_nodes(&mut self) -> Result<()> {
        if !self.node_buffer.is_empty() {
            self.store.insert_nodes(&self.node_buffer)?;
            self.node_buffer.clear();
        }
        Ok(())
    }

    fn flush_edges(&mut self) -> Result<()> {
        if !self.edge_buffer.is_empty() {
            self.store.insert_edges(&self.edge_buffer)?;
            self.edge_buffer.clear();
        }
        Ok(())
    }

    fn queue_node(&mut self, id: NodeRef) -> Result<()> {
        if self.emitted_nodes.contains(&id) {
            return Ok(());
        }
        let Some((lon, lat)) = self.node_map.get(id) else {
            self.stats.bump("intersection_missing_coord");
            return Ok(());
        };
        self.emitted_nodes.insert(id);
        self.node_buffer.push(TopologyNode { id, lon, lat });
        if self.node_buffer.len() >= self.config.chunk_size {
            self.flush_nodes()?;
        }
        Ok(())
    }
}

impl<S: TopologyStore> PbfHandler for Pass2Handler<'_, S> {
    fn on_node(&mut self, node: NodeEvent) {
        if self.intersections.contains(&node.id) {
            let _ = self.node_map.fill(node.id, node.lon, node.lat);
        }
    }

    fn on_way(&mut self, way: WayEvent) {
        let Some(tag) = way.tags.get("highway") else {
            return;
        };
        let Some(code) = waymapping::classify(tag) else {
            return;
        };
        if way.node_refs.len() < 2 {
            return;
        }

        let name = way.tags.get_or_empty("name");

        let mut seq: i64 = 0;
        for sub_way in split_on_intersections(&way.node_refs, self.intersections) {
            let pieces = match self.config.max_meters {
                Some(max_meters) => splitter::split(&sub_way, self.node_map, &mut HashSet::new(), max_meters),
                None => {
                    if sub_way.len() >= 2 {
                        vec![sub_way]
                    } else {
                        Vec::new()
                    }
                }
            };

            for piece in pieces {
                let this_seq = seq;
                seq += 1;
                if piece.len() < 2 {
                    self.stats.bump("subway_too_short");
                    continue;
                }
                if let Err(err) = self.emit_edge(way.id, code, &name, this_seq, &piece) {
                    tracing::warn!(way_id = way.id, error = %err, "failed to emit topology edge");
                    self.stats.bump("edge_emit_error");
                }
            }
        }
    }
}

impl<S: TopologyStore> Pass2Handler<'_, S> {
    fn emit_edge(&mut self, osm_id: NodeRef, highway_code: u16, name: &str, seq: i64, piece: &[NodeRef]) -> Result<()> {
        let source = piece[0];
        let target = *piece.last().unwrap();

        self.queue_node(source)?;
        self.queue_node(target)?;

        let mut coords = Vec::with_capacity(piece.len());
        for &id in piece {
            let Some((lon, lat)) = self.node_map.get(id) else {
                self.stats.bump("edge_missing_coord");
                return Ok(());
            };
            coords.push((lon, lat));
        }

        let (lon1, lat1) = coords[0];
        let (lon2, lat2) = *coords.last().unwrap();

        let edge = TopologyEdge {
            id: osm_id * 10000 + seq,
            osm_id,
            highway_code,
            source,
            target,
            lon1,
            lat1,
            lon2,
            lat2,
            name: name.to_string(),
            linestring: LineString::from(coords),
            length_m: None,
        };
        self.edge_buffer.push(edge);
        self.stats.bump("edge_emitted");
        if self.edge_buffer.len() >= self.config.chunk_size {
            self.flush_edges()?;
        }
        Ok(())
    }
}

/// Breaks `node_refs` at every node present in `intersections`, except
/// never at position 0 (the way's own start is always a boundary, not a
/// mid-way break). Adjacent sub-ways share the split node.
fn split_on_intersections(node_refs: &[NodeRef], intersections: &HashSet<NodeRef>) -> Vec<Vec<NodeRef>> {
    let mut result = Vec::new();
    let mut current = vec![node_refs[0]];

    for &id in &node_refs[1..] {
        current.push(id);
        if intersections.contains(&id) {
            result.push(std::mem::replace(&mut current, vec![id]));
        }
    }
    if current.len() > 1 {
        result.push(current);
    }
    result
}

/// Runs the full two-pass pipeline against `source`, writing the
/// resulting topology into `store`.
pub fn build<Src, S>(
    source: &Src,
    node_map: &mut NodeCoordMap,
    store: &mut S,
    config: &TopologyBuilderConfig,
    stats: &mut Stats,
) -> Result<()>
where
    Src: PbfSource,
    Src::Error: Into<osmtopo_common::Error>,
    S: TopologyStore,
{
    let mut intersections: HashSet<NodeRef> = HashSet::new();

    {
        let mut handler = Pass1Handler {
            node_map,
            intersections: &mut intersections,
            stats,
        };
        source.run(&mut handler).map_err(Into::into)?;
    }

    store.bootstrap()?;

    {
        let mut handler = Pass2Handler {
            node_map,
            intersections: &intersections,
            config,
            store,
            node_buffer: Vec::new(),
            edge_buffer: Vec::new(),
            emitted_nodes: HashSet::new(),
            stats,
        };
        source.run(&mut handler).map_err(Into::into)?;
        handler.flush_nodes()?;
        handler.flush_edges()?;
    }

    store.populate_lengths()?;
    store.create_indexes()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodemap::NodeCacheBackend;
    use crate::pbf::Tags;
    use crate::store::InMemoryTopologyStore;

    /// An in-memory fixed sequence of events, replayed identically on
    /// every `run` call - enough to exercise a real two-pass consumer.
    struct FixedSource {
        nodes: Vec<NodeEvent>,
        ways: Vec<WayEvent>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fixed source never fails")]
    struct Never;

    impl PbfSource for FixedSource {
        type Error = Never;

        fn run(&self, handler: &mut dyn PbfHandler) -> std::result::Result<(), Never> {
            for node in &self.nodes {
                handler.on_node(node.clone());
            }
            for way in &self.ways {
                handler.on_way(way.clone());
            }
            Ok(())
        }
    }

    impl From<Never> for osmtopo_common::Error {
        fn from(_: Never) -> Self {
            osmtopo_common::Error::Store("unreachable".to_string())
        }
    }

    fn way(id: NodeRef, refs: &[NodeRef], highway: &str) -> WayEvent {
        WayEvent {
            id,
            node_refs: refs.to_vec(),
            tags: Tags(vec![("highway".to_string(), highway.to_string())]),
            linestring: Ok(LineString::from(vec![])),
        }
    }

    #[test]
    fn two_ways_sharing_an_endpoint_produce_one_intersection() {
        let source = FixedSource {
            nodes: vec![
                NodeEvent { id: 1, lon: 0.0, lat: 0.0, tags: Tags::default() },
                NodeEvent { id: 2, lon: 0.0, lat: 0.001, tags: Tags::default() },
                NodeEvent { id: 3, lon: 0.0, lat: 0.002, tags: Tags::default() },
            ],
            ways: vec![way(10, &[1, 2], "residential"), way(11, &[2, 3], "residential")],
        };

        let mut node_map = NodeCoordMap::new(&NodeCacheBackend::InMemory).unwrap();
        let mut store = InMemoryTopologyStore::new();
        let mut stats = Stats::new();
        let config = TopologyBuilderConfig::default();

        build(&source, &mut node_map, &mut store, &config, &mut stats).unwrap();

        assert_eq!(store.nodes.len(), 3, "both endpoints of each way plus the shared node");
        assert_eq!(store.edges.len(), 2);
        for edge in &store.edges {
            assert!(edge.length_m.unwrap() > 0.0);
        }
    }

    #[test]
    fn non_highway_ways_are_filtered() {
        let source = FixedSource {
            nodes: vec![
                NodeEvent { id: 1, lon: 0.0, lat: 0.0, tags: Tags::default() },
                NodeEvent { id: 2, lon: 0.0, lat: 0.001, tags: Tags::default() },
            ],
            ways: vec![way(10, &[1, 2], "footway")],
        };

        let mut node_map = NodeCoordMap::new(&NodeCacheBackend::InMemory).unwrap();
        let mut store = InMemoryTopologyStore::new();
        let mut stats = Stats::new();
        let config = TopologyBuilderConfig::default();

        build(&source, &mut node_map, &mut store, &config, &mut stats).unwrap();

        assert!(store.nodes.is_empty());
        assert!(store.edges.is_empty());
    }

    #[test]
    fn max_meters_splits_a_long_way() {
        let source = FixedSource {
            nodes: vec![
                NodeEvent { id: 1, lon: 0.0, lat: 0.0, tags: Tags::default() },
                NodeEvent { id: 2, lon: 0.0, lat: 0.01, tags: Tags::default() },
            ],
            ways: vec![way(10, &[1, 2], "residential")],
        };

        let mut node_map = NodeCoordMap::new(&NodeCacheBackend::InMemory).unwrap();
        let mut store = InMemoryTopologyStore::new();
        let mut stats = Stats::new();
        let config = TopologyBuilderConfig {
            max_meters: Some(500.0),
            chunk_size: CHUNK_SIZE,
        };

        build(&source, &mut node_map, &mut store, &config, &mut stats).unwrap();

        assert!(store.edges.len() >= 2, "a ~906m way under a 500m budget must split");
    }

    #[test]
    fn edges_from_one_way_get_distinct_ids_across_intersection_sub_ways() {
        // Way 10 is [A, B, C, D] with B also the shared endpoint of way 11,
        // so it gets split into two sub-ways at B: [A, B] and [B, C, D].
        // Both must end up with a unique id (way_id*10000 + seq).
        let source = FixedSource {
            nodes: vec![
                NodeEvent { id: 1, lon: 0.0, lat: 0.0, tags: Tags::default() },
                NodeEvent { id: 2, lon: 0.0, lat: 0.001, tags: Tags::default() },
                NodeEvent { id: 3, lon: 0.0, lat: 0.002, tags: Tags::default() },
                NodeEvent { id: 4, lon: 0.0, lat: 0.003, tags: Tags::default() },
                NodeEvent { id: 5, lon: 0.001, lat: 0.001, tags: Tags::default() },
            ],
            ways: vec![way(10, &[1, 2, 3, 4], "residential"), way(11, &[2, 5], "residential")],
        };

        let mut node_map = NodeCoordMap::new(&NodeCacheBackend::InMemory).unwrap();
        let mut store = InMemoryTopologyStore::new();
        let mut stats = Stats::new();
        let config = TopologyBuilderConfig::default();

        build(&source, &mut node_map, &mut store, &config, &mut stats).unwrap();

        let way_10_ids: Vec<NodeRef> = store.edges.iter().filter(|e| e.osm_id == 10).map(|e| e.id).collect();
        assert_eq!(way_10_ids.len(), 2, "way 10 splits into [A,B] and [B,C,D]");
        assert_eq!(way_10_ids[0], 10 * 10000);
        assert_eq!(way_10_ids[1], 10 * 10000 + 1);
        assert_ne!(way_10_ids[0], way_10_ids[1]);
    }
}
