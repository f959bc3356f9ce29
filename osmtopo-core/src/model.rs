//! Shared entity and value types for both pipelines.

use geo::{LineString, MultiPolygon, Point};

/// A raw OSM node/way/relation numeric id.
///
/// OSM itself doesn't distinguish the id spaces of nodes, ways and
/// relations by type, only by which element kind carries them - so a
/// single signed 64-bit alias is used everywhere a bare id is passed
/// around (way node references, relation member refs, topology vertex
/// ids, ...).
pub type NodeRef = i64;

/// A value: the postal address fields extracted from an OSM tag bag.
///
/// Every field is an empty string when the corresponding tag was absent;
/// an `Address` is never "missing", only carrying blanks, which keeps the
/// downstream resolvers from juggling `Option<String>` everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub housenumber: String,
    pub city: String,
    pub street: String,
    pub postcode: String,
    pub city_simc: String,
}

/// An addressed feature: a building, an amenity node, or an addressed
/// multipolygon relation.
///
/// `street_distance` starts at [`Place::SENTINEL_DISTANCE`], a value no
/// legitimate street match can produce, so the Street Matcher's "is this
/// closer than what we have" check works uniformly for places that have
/// never matched anything.
#[derive(Debug, Clone)]
pub struct Place {
    /// Stable id, prefixed `n`/`w`/`r` for the originating node/way/relation.
    pub pid: String,
    pub name: String,
    pub amenity: Option<String>,
    pub addr: Address,
    /// Representative point: the node's own location, or a way/relation's
    /// geometric centroid.
    pub geo: Point<f64>,
    /// Degrees to the nearest matched street, or the sentinel if unmatched.
    pub street_distance: f64,
    /// Source way of a matched unnamed/renamed street, if any.
    pub street_id: Option<NodeRef>,
    pub city_from_area: bool,
    pub postcode_from_area: bool,
}

impl Place {
    /// Wider than any legitimate match (the whole globe is ~360 degrees
    /// wide), used to seed `street_distance` before any match has run.
    pub const SENTINEL_DISTANCE: f64 = 360.0;

    pub fn new(pid: String, name: String, amenity: Option<String>, addr: Address, geo: Point<f64>) -> Self {
        Self {
            pid,
            name,
            amenity,
            addr,
            geo,
            street_distance: Self::SENTINEL_DISTANCE,
            street_id: None,
            city_from_area: false,
            postcode_from_area: false,
        }
    }
}

/// An administrative boundary or other multipolygon area.
#[derive(Debug, Clone)]
pub struct Area {
    pub id: String,
    pub name: String,
    /// 0, 1, 3 or 4: +3 if any of teryt:simc/teryt:terc/terc:typ is present,
    /// +1 if `population` is present.
    pub quality: u8,
    /// Admin level, constrained by the caller to `[5, 9]` before an `Area`
    /// is ever constructed.
    pub admin_level: u8,
    pub geo: MultiPolygon<f64>,
    pub centroid: Point<f64>,
    pub postcode: String,
}

/// A relation with an address whose geometry isn't known yet: its
/// representative member way hasn't been read.
#[derive(Debug, Clone)]
pub struct RelationStub {
    pub id: String,
    pub name: String,
    pub amenity: Option<String>,
    pub addr: Address,
    /// Way id of the chosen representative member, resolved by the
    /// Geometry Matcher.
    pub way_ref: NodeRef,
}

/// A named place carrying a postcode, used to back-fill `Area::postcode`.
#[derive(Debug, Clone)]
pub struct PostalPlace {
    pub name: String,
    pub is_in: String,
    pub postcode: String,
    pub point: Point<f64>,
}

/// A routable graph vertex: either a natural intersection or a synthetic
/// point inserted to keep an edge under `max_meters`.
#[derive(Debug, Clone, Copy)]
pub struct TopologyNode {
    pub id: NodeRef,
    pub lon: f64,
    pub lat: f64,
}

impl TopologyNode {
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// A routable graph edge: a (possibly split) sub-way between two
/// topology vertices.
#[derive(Debug, Clone)]
pub struct TopologyEdge {
    /// `osm_way_id * 10000 + seq`.
    pub id: NodeRef,
    pub osm_id: NodeRef,
    pub highway_code: u16,
    pub source: NodeRef,
    pub target: NodeRef,
    pub lon1: f64,
    pub lat1: f64,
    pub lon2: f64,
    pub lat2: f64,
    pub name: String,
    pub linestring: LineString<f64>,
    /// Filled in by the topology store from the linestring's geographic
    /// length; `None` until that happens.
    pub length_m: Option<f64>,
}
