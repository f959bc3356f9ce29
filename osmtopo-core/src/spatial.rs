//! Spatial index: a thin `rstar` wrapper exposing exactly the
//! operations the Address Resolver needs - point lookups for the
//! street-less place index, bounding-box lookups for the area index and
//! the Street Matcher's corridor search.
//!
//! Two index flavors share one R-tree entry shape (`IndexedEntry`)
//! distinguished only by whether their envelope degenerates to a point.

use geo::{BoundingRect, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// An id paired with the envelope it was indexed under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedEntry {
    pub id: u64,
    pub envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Bulk-loadable R-tree over points or bounding boxes, keyed by an
/// arbitrary caller-assigned `u64` id.
///
/// The Address Extractor uses point entries keyed by a Place's ordinal
/// position (discarded before the final sort); the Area Resolver and
/// Street Matcher use bbox entries keyed by Area/way id.
pub struct SpatialIndex {
    tree: RTree<IndexedEntry>,
}

impl SpatialIndex {
    /// Builds an index from an already-collected list of entries -
    /// `rstar::RTree::bulk_load` is O(n log n) and strictly faster than
    /// n amortized inserts at the millions-of-points scale this system
    /// operates at.
    pub fn bulk_load(entries: Vec<IndexedEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn empty() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn insert_point(&mut self, id: u64, lon: f64, lat: f64) {
        self.tree.insert(IndexedEntry {
            id,
            envelope: AABB::from_point([lon, lat]),
        });
    }

    pub fn insert_bbox(&mut self, id: u64, rect: Rect<f64>) {
        self.tree.insert(IndexedEntry {
            id,
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
        });
    }

    /// Ids of every entry whose envelope contains `(lon, lat)`.
    pub fn intersect_point(&self, lon: f64, lat: f64) -> impl Iterator<Item = u64> + '_ {
        self.tree
            .locate_all_at_point(&[lon, lat])
            .map(|entry| entry.id)
    }

    /// Ids of every entry whose envelope overlaps the given box.
    pub fn intersect_bbox(&self, min: (f64, f64), max: (f64, f64)) -> impl Iterator<Item = u64> + '_ {
        let query = AABB::from_corners([min.0, min.1], [max.0, max.1]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.id)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Builds a bounding box from a geometry's rect, expanded by `margin` in
/// each direction - used by the Street Matcher to turn a linestring into
/// a corridor query (`MAX_DISTANCE` on every side).
pub fn expanded_bbox<G: BoundingRect<f64, Output = Option<Rect<f64>>>>(
    geometry: &G,
    margin: f64,
) -> Option<((f64, f64), (f64, f64))> {
    let rect = geometry.bounding_rect()?;
    Some((
        (rect.min().x - margin, rect.min().y - margin),
        (rect.max().x + margin, rect.max().y + margin),
    ))
}
