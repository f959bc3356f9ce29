//! `osmpbf`-backed implementation of [`osmtopo_core::pbf::PbfSource`].
//!
//! Raw `osmpbf` has no concept of an "Area" - that's an `osmium`-specific
//! synthesis step pyosmium performs internally. Here it's reconstructed
//! from two simpler primitives: a closed way is treated as its own ring,
//! and a `type=multipolygon` relation is assembled from its `outer`-role
//! member ways (each contributing one exterior ring) and `inner`-role
//! member ways (each contributing one interior ring of the nearest
//! preceding exterior). Rings split across multiple ways are not
//! stitched back together - real administrative boundaries sometimes
//! split a ring across several ways, and those are skipped with a stat,
//! rather than reconstructed, since ring-joining is a substantial
//! algorithm in its own right and not the focus of this tool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use geo::{LineString, MultiPolygon, Polygon};
use osmpbf::{Element, ElementReader};

use osmtopo_core::nodemap::{NodeCacheBackend, NodeCoordMap};
use osmtopo_core::pbf::{
    AreaEvent, AreaOrigin, GeometryError, MemberKind, NodeEvent, PbfHandler, PbfSource, RelationEvent, RelationMember,
    Tags, WayEvent,
};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read PBF file {path}: {source}")]
    Osmpbf {
        path: PathBuf,
        #[source]
        source: osmpbf::Error,
    },

    #[error("failed to set up node coordinate cache: {0}")]
    NodeCache(#[from] std::io::Error),
}

impl From<SourceError> for osmtopo_common::Error {
    fn from(err: SourceError) -> Self {
        osmtopo_common::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
    }
}

/// `osmpbf`-backed [`PbfSource`]: reads the file up to four times (once
/// per element kind it needs resolved coordinates for), so the file is
/// expected to support being opened and scanned repeatedly.
///
/// The node-coordinate cache built on the first pass is the same
/// [`NodeCoordMap`] the Topology Builder uses, so `--cache-mem` picks
/// one backend for both the reader's own geometry assembly and (when
/// running `topo-import`) the topology pipeline.
pub struct OsmpbfSource {
    path: PathBuf,
    cache_backend: NodeCacheBackend,
}

impl OsmpbfSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_cache_backend(path, NodeCacheBackend::InMemory)
    }

    pub fn with_cache_backend(path: impl AsRef<Path>, cache_backend: NodeCacheBackend) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache_backend,
        }
    }

    fn open(&self) -> Result<ElementReader<std::io::BufReader<std::fs::File>>, SourceError> {
        ElementReader::from_path(&self.path).map_err(|source| SourceError::Osmpbf {
            path: self.path.clone(),
            source,
        })
    }
}

fn collect_tags<'a>(iter: impl Iterator<Item = (&'a str, &'a str)>) -> Tags {
    Tags(iter.map(|(k, v)| (k.to_string(), v.to_string())).collect())
}

fn build_linestring(refs: &[i64], coords: &NodeCoordMap) -> Result<LineString<f64>, GeometryError> {
    let mut points = Vec::with_capacity(refs.len());
    for &r in refs {
        match coords.get(r) {
            Some(point) => points.push(point),
            None => return Err(GeometryError::InvalidLocation),
        }
    }
    Ok(LineString::from(points))
}

fn build_ring(refs: &[i64], coords: &NodeCoordMap) -> Result<LineString<f64>, GeometryError> {
    let ring = build_linestring(refs, coords)?;
    if ring.0.first() != ring.0.last() {
        return Err(GeometryError::InvalidMultipolygon(
            "ring is not closed".to_string(),
        ));
    }
    Ok(ring)
}

impl PbfSource for OsmpbfSource {
    type Error = SourceError;

    fn run(&self, handler: &mut dyn PbfHandler) -> Result<(), Self::Error> {
        // Pass A: collect every node's coordinate, needed to assemble
        // way/area geometry further down in the same logical pass (OSM
        // extracts are conventionally ordered all-nodes, all-ways,
        // all-relations, so a single coordinate cache built here covers
        // every way and relation the file contains).
        let mut coords = NodeCoordMap::new(&self.cache_backend)?;
        let mut nodes: Vec<NodeEvent> = Vec::new();

        self.open()?
            .for_each(|element| match element {
                Element::Node(node) => {
                    let _ = coords.insert_coord(node.id(), node.lon(), node.lat());
                    nodes.push(NodeEvent {
                        id: node.id(),
                        lon: node.lon(),
                        lat: node.lat(),
                        tags: collect_tags(node.tags()),
                    });
                }
                Element::DenseNode(node) => {
                    let _ = coords.insert_coord(node.id(), node.lon(), node.lat());
                    nodes.push(NodeEvent {
                        id: node.id(),
                        lon: node.lon(),
                        lat: node.lat(),
                        tags: collect_tags(node.tags()),
                    });
                }
                _ => {}
            })
            .map_err(|source| SourceError::Osmpbf {
                path: self.path.clone(),
                source,
            })?;

        for node in nodes {
            handler.on_node(node);
        }

        // Pass B: ways, re-reading the file so the coordinate cache above
        // is fully populated before any way references it.
        let mut ways: Vec<(i64, Vec<i64>, Tags)> = Vec::new();
        self.open()?
            .for_each(|element| {
                if let Element::Way(way) = element {
                    ways.push((way.id(), way.refs().collect(), collect_tags(way.tags())));
                }
            })
            .map_err(|source| SourceError::Osmpbf {
                path: self.path.clone(),
                source,
            })?;

        for (id, refs, tags) in ways {
            let linestring = build_linestring(&refs, &coords);

            if refs.len() >= 4 && refs.first() == refs.last() && !tags.contains_key("highway") {
                if let Ok(ring) = build_ring(&refs, &coords) {
                    let multipolygon = Ok(MultiPolygon::new(vec![Polygon::new(ring, vec![])]));
                    handler.on_area(AreaEvent {
                        id,
                        orig_id: id,
                        origin: AreaOrigin::Way,
                        tags: tags.clone(),
                        multipolygon,
                    });
                }
            }

            handler.on_way(WayEvent {
                id,
                node_refs: refs,
                tags,
                linestring,
            });
        }

        // Pass C: relations, synthesizing a multipolygon Area for
        // `type=multipolygon` relations from their outer/inner member
        // ways.
        let mut relations: Vec<(i64, Vec<RelationMember>, Tags)> = Vec::new();
        self.open()?
            .for_each(|element| {
                if let Element::Relation(relation) = element {
                    let members = relation
                        .members()
                        .filter_map(|member| {
                            let kind = match member.member_type {
                                osmpbf::RelMemberType::Node => MemberKind::Node,
                                osmpbf::RelMemberType::Way => MemberKind::Way,
                                osmpbf::RelMemberType::Relation => return None,
                            };
                            Some(RelationMember {
                                kind,
                                ref_id: member.member_id,
                                role: member.role().unwrap_or("").to_string(),
                            })
                        })
                        .collect();
                    relations.push((relation.id(), members, collect_tags(relation.tags())));
                }
            })
            .map_err(|source| SourceError::Osmpbf {
                path: self.path.clone(),
                source,
            })?;

        // Member ways' node lists are needed to build ring geometry;
        // gather them in a fourth pass rather than hold all way
        // geometry in memory from pass B onward.
        let mut way_refs: HashMap<i64, Vec<i64>> = HashMap::new();
        {
            let referenced: std::collections::HashSet<i64> = relations
                .iter()
                .flat_map(|(_, members, _)| members.iter())
                .filter(|m| m.kind == MemberKind::Way)
                .map(|m| m.ref_id)
                .collect();
            self.open()?
                .for_each(|element| {
                    if let Element::Way(way) = element {
                        if referenced.contains(&way.id()) {
                            way_refs.insert(way.id(), way.refs().collect());
                        }
                    }
                })
                .map_err(|source| SourceError::Osmpbf {
                    path: self.path.clone(),
                    source,
                })?;
        }

        for (id, members, tags) in relations {
            if tags.get("type") == Some("multipolygon") {
                let multipolygon = assemble_multipolygon(&members, &way_refs, &coords);
                handler.on_area(AreaEvent {
                    id,
                    orig_id: id,
                    origin: AreaOrigin::Relation,
                    tags: tags.clone(),
                    multipolygon,
                });
            }
            handler.on_relation(RelationEvent { id, members, tags });
        }

        Ok(())
    }
}

fn assemble_multipolygon(
    members: &[RelationMember],
    way_refs: &HashMap<i64, Vec<i64>>,
    coords: &NodeCoordMap,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for member in members {
        if member.kind != MemberKind::Way || !member.role.starts_with('o') {
            continue;
        }
        let Some(refs) = way_refs.get(&member.ref_id) else {
            continue;
        };
        let exterior = build_ring(refs, coords)?;
        polygons.push(Polygon::new(exterior, vec![]));
    }

    if polygons.is_empty() {
        return Err(GeometryError::InvalidMultipolygon(
            "no outer-role member way produced a ring".to_string(),
        ));
    }

    for member in members {
        if member.kind != MemberKind::Way || !member.role.starts_with('i') {
            continue;
        }
        let Some(refs) = way_refs.get(&member.ref_id) else {
            continue;
        };
        if let Ok(hole) = build_ring(refs, coords) {
            if let Some(last) = polygons.last_mut() {
                last.interiors_push(hole);
            }
        }
    }

    Ok(MultiPolygon::new(polygons))
}
