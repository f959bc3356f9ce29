//! The external PBF parser contract.
//!
//! Byte-level PBF parsing is deliberately out of scope for this crate - it
//! is assumed to be provided by an external streaming parser. What *is*
//! specified is the shape of the four event kinds it emits and the
//! handler interface the engines register against, so that a thin adapter
//! (an `osmpbf`-backed implementation lives in the `osmtopo-cli` binary)
//! can plug a real parser in without the engines knowing it exists.

use geo::{LineString, MultiPolygon};
use thiserror::Error;

use crate::model::NodeRef;

/// An OSM tag bag, normalized to UTF-8 strings end-to-end.
///
/// The legacy two-pass parser this system replaces returned tag keys as
/// byte sequences on one side and strings on the other; that inconsistency
/// is a known bug in the original and is not preserved here.
#[derive(Debug, Clone, Default)]
pub struct Tags(pub Vec<(String, String)>);

impl Tags {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// `get`, with the empty string standing in for "absent" - the shape
    /// every field of [`crate::model::Address`] needs.
    pub fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or("").to_string()
    }
}

/// Failure building geometry from a way or area's member nodes.
///
/// Mirrors the two `shapely`/`osmium` failure modes in the original: a
/// referenced node whose location wasn't resolved (`InvalidLocation`,
/// matching `osmium.InvalidLocationError`), and a multipolygon whose rings
/// don't assemble (`InvalidMultipolygon`, matching the bare `RuntimeError`
/// pyosmium's WKT factory raises).
#[derive(Debug, Error, Clone)]
pub enum GeometryError {
    #[error("way references a node with no resolved location")]
    InvalidLocation,
    #[error("failed to assemble multipolygon: {0}")]
    InvalidMultipolygon(String),
}

#[derive(Debug, Clone)]
pub struct NodeEvent {
    pub id: NodeRef,
    pub lon: f64,
    pub lat: f64,
    pub tags: Tags,
}

#[derive(Debug, Clone)]
pub struct WayEvent {
    pub id: NodeRef,
    pub node_refs: Vec<NodeRef>,
    pub tags: Tags,
    /// The way's linestring, already built by the parser from its own
    /// node location cache.
    pub linestring: Result<LineString<f64>, GeometryError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone)]
pub struct RelationMember {
    pub kind: MemberKind,
    pub ref_id: NodeRef,
    /// Empty string for a member with no role.
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct RelationEvent {
    pub id: NodeRef,
    pub members: Vec<RelationMember>,
    pub tags: Tags,
}

/// Whether an `Area` was synthesized from a closed way or a multipolygon
/// relation - the Address Extractor's area handling branches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaOrigin {
    Way,
    Relation,
}

#[derive(Debug, Clone)]
pub struct AreaEvent {
    pub id: NodeRef,
    /// For a relation-derived area, the original relation id.
    pub orig_id: NodeRef,
    pub origin: AreaOrigin,
    pub tags: Tags,
    pub multipolygon: Result<MultiPolygon<f64>, GeometryError>,
}

/// Registers interest in whichever element kinds a pass needs; methods
/// left at their default no-op simply aren't called.
///
/// This mirrors `osmium.SimpleHandler`: a pipeline implements only the
/// callbacks relevant to its current pass (Topology Builder's pass 1
/// implements only `on_way`; pass 2 implements `on_node` and `on_way`).
pub trait PbfHandler {
    fn on_node(&mut self, _node: NodeEvent) {}
    fn on_way(&mut self, _way: WayEvent) {}
    fn on_relation(&mut self, _relation: RelationEvent) {}
    fn on_area(&mut self, _area: AreaEvent) {}
}

/// A rereadable source of OSM primitives.
///
/// `run` performs one full streaming pass over the underlying file,
/// delivering nodes before ways before relations within each block.
/// Calling `run` again starts a fresh pass from the beginning of the
/// file - both the Topology Builder (2 passes) and the Address Resolver
/// (3 passes: Extractor, Geometry Matcher, Street Matcher) depend on
/// this.
pub trait PbfSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn run(&self, handler: &mut dyn PbfHandler) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_get_or_empty_falls_back() {
        let tags = Tags(vec![("addr:city".to_string(), "Warsaw".to_string())]);
        assert_eq!(tags.get_or_empty("addr:city"), "Warsaw");
        assert_eq!(tags.get_or_empty("addr:street"), "");
    }

    #[test]
    fn tags_contains_key() {
        let tags = Tags(vec![("religion".to_string(), "christian".to_string())]);
        assert!(tags.contains_key("religion"));
        assert!(!tags.contains_key("boundary"));
    }
}
