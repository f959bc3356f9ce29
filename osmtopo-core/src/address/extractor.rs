//! Address Extractor: the first pass over the address pipeline.
//!
//! Builds `Place`s from addressed nodes, ways and relations, collects
//! administrative `Area`s, and tracks `PostalPlace`s for postcode
//! back-fill. Addressed relations can't get their geometry here -
//! members aren't resolved in a single pass - so they're parked as
//! `RelationStub`s for the Geometry Matcher to finish.

use std::collections::HashMap;

use geo::Centroid;
use osmtopo_common::Stats;

use crate::address::postcode::get_postcode;
use crate::address::tags::tags_to_address;
use crate::model::{Area, Place, PostalPlace, RelationStub};
use crate::pbf::{AreaEvent, AreaOrigin, MemberKind, NodeEvent, PbfHandler, RelationEvent, WayEvent};
use crate::spatial::SpatialIndex;

/// Sorts relation members so an outline/outer member is picked as the
/// representative way whenever one exists (§4.6): `o` before `i` before
/// `p` before anything else, empty roles sorting last of all.
fn member_sort_key(role: &str) -> (u8, u8) {
    match role.as_bytes().first() {
        None => (2, 255),
        Some(b'o') => (0, 0),
        Some(b'i') => (0, 1),
        Some(b'p') => (0, 2),
        Some(&c) => (1, c),
    }
}

const ADMIN_LEVEL_MIN: u8 = 5;
const ADMIN_LEVEL_MAX: u8 = 9;

pub struct AddressExtractor<'a> {
    pub places: Vec<Place>,
    pub relations: Vec<RelationStub>,
    pub areas: Vec<Area>,
    pub postal_places: Vec<PostalPlace>,
    pub simc_to_postcode: HashMap<String, String>,
    /// Keyed by ordinal position in `places`; valid only until `places`
    /// is sorted (see the Area Resolver).
    pub street_less_index: SpatialIndex,
    stats: &'a mut Stats,
}

impl<'a> AddressExtractor<'a> {
    pub fn new(stats: &'a mut Stats) -> Self {
        Self {
            places: Vec::new(),
            relations: Vec::new(),
            areas: Vec::new(),
            postal_places: Vec::new(),
            simc_to_postcode: HashMap::new(),
            street_less_index: SpatialIndex::empty(),
            stats,
        }
    }

    fn index_place(&mut self, place: Place) {
        let ordinal = self.places.len() as u64;
        if place.addr.street.is_empty() {
            self.street_less_index.insert_point(ordinal, place.geo.x(), place.geo.y());
            self.stats.bump("no_street_idx");
        }
        self.places.push(place);
    }
}

impl PbfHandler for AddressExtractor<'_> {
    fn on_node(&mut self, node: NodeEvent) {
        self.stats.bump("nodes");

        if let Some(postal_code) = node.tags.get("postal_code") {
            if let Some(simc) = node.tags.get("simc") {
                self.simc_to_postcode
                    .insert(simc.to_string(), postal_code.to_string());
            }
            self.postal_places.push(PostalPlace {
                name: node.tags.get_or_empty("name"),
                is_in: node.tags.get_or_empty("is_in"),
                postcode: postal_code.to_string(),
                point: geo::Point::new(node.lon, node.lat),
            });
        }

        if !node.tags.contains_key("addr:housenumber") {
            self.stats.bump("node_no_housenumber");
            return;
        }

        let addr = tags_to_address(&node.tags, self.stats);
        let amenity = node.tags.get("amenity").map(str::to_string);
        let place = Place::new(
            format!("n{}", node.id),
            node.tags.get_or_empty("name"),
            amenity,
            addr,
            geo::Point::new(node.lon, node.lat),
        );
        self.index_place(place);
    }

    fn on_way(&mut self, way: WayEvent) {
        self.stats.bump("ways");

        if !way.tags.contains_key("addr:housenumber") {
            self.stats.bump("way_no_housenumber");
            return;
        }

        let linestring = match way.linestring {
            Ok(ls) => ls,
            Err(_) => {
                self.stats.bump("way_with_invalid_location");
                return;
            }
        };
        let Some(centroid) = linestring.centroid() else {
            self.stats.bump("way_with_invalid_location");
            return;
        };

        let addr = tags_to_address(&way.tags, self.stats);
        let amenity = way.tags.get("amenity").map(str::to_string);
        let place = Place::new(format!("w{}", way.id), way.tags.get_or_empty("name"), amenity, addr, centroid);
        self.index_place(place);
    }

    fn on_area(&mut self, area: AreaEvent) {
        self.stats.bump("areas");

        if area.origin == AreaOrigin::Relation && area.tags.contains_key("addr:housenumber") {
            self.stats.bump("areas_as_relation");
            let multipolygon = match area.multipolygon {
                Ok(mp) => mp,
                Err(_) => {
                    self.stats.bump("areas_as_relation_with_runtime_error");
                    return;
                }
            };
            let Some(centroid) = multipolygon.centroid() else {
                self.stats.bump("areas_as_relation_with_runtime_error");
                return;
            };
            let addr = tags_to_address(&area.tags, self.stats);
            let amenity = area.tags.get("amenity").map(str::to_string);
            let place = Place::new(format!("r{}", area.orig_id), area.tags.get_or_empty("name"), amenity, addr, centroid);
            self.index_place(place);
            return;
        }

        let Some(boundary) = area.tags.get("boundary") else {
            self.stats.bump("areas_not_boundary");
            return;
        };
        if boundary != "administrative" {
            self.stats.bump("areas_not_administrative");
            return;
        }

        let admin_level: u8 = area
            .tags
            .get("admin_level")
            .and_then(|v| v.parse().ok())
            .unwrap_or(99);
        if admin_level < ADMIN_LEVEL_MIN || admin_level > ADMIN_LEVEL_MAX {
            self.stats.bump("areas_bad_level");
            return;
        }

        if area.tags.contains_key("religion") {
            self.stats.bump("areas_religion");
            return;
        }

        let multipolygon = match area.multipolygon {
            Ok(mp) => mp,
            Err(_) => {
                self.stats.bump("area_with_runtime_error");
                return;
            }
        };
        let Some(centroid) = multipolygon.centroid() else {
            self.stats.bump("area_with_runtime_error");
            return;
        };

        let name = area.tags.get_or_empty("name");
        let simc = area.tags.get_or_empty("teryt:simc");
        let terc = area.tags.get_or_empty("teryt:terc");
        let terc_type = area.tags.get_or_empty("terc:typ");
        let has_population = area.tags.contains_key("population");

        if name.starts_with("gmina ") {
            self.stats.bump("areas_gmina");
        }
        if name.starts_with("powiat ") {
            self.stats.bump("areas_powiat");
        }

        let mut quality: u8 = 0;
        if !terc.is_empty() || !terc_type.is_empty() || !simc.is_empty() {
            quality += 3;
        }
        if has_population {
            quality += 1;
        }

        let postcode = get_postcode(&simc, &name, &multipolygon, &self.simc_to_postcode, &self.postal_places);

        self.areas.push(Area {
            id: format!("{}", area.id),
            name,
            quality,
            admin_level,
            geo: multipolygon,
            centroid,
            postcode,
        });
    }

    fn on_relation(&mut self, relation: RelationEvent) {
        self.stats.bump("relations");

        if relation.tags.get("type") == Some("multipolygon") {
            self.stats.bump("relation_wrong_type");
            return;
        }
        if !relation.tags.contains_key("addr:housenumber") {
            self.stats.bump("relation_no_housenumber");
            return;
        }

        let mut way_members: Vec<_> = relation
            .members
            .iter()
            .filter(|m| m.kind == MemberKind::Way)
            .collect();
        if way_members.is_empty() {
            self.stats.bump("relation_without_way_members");
            return;
        }
        way_members.sort_by_key(|m| member_sort_key(&m.role));

        let way_ref = way_members[0].ref_id;
        let addr = tags_to_address(&relation.tags, self.stats);
        self.relations.push(RelationStub {
            id: format!("r{}", relation.id),
            name: relation.tags.get_or_empty("name"),
            amenity: relation.tags.get("amenity").map(str::to_string),
            addr,
            way_ref,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pbf::{GeometryError, Tags};
    use geo::{polygon, LineString, MultiPolygon};

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        Tags(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn node_without_housenumber_is_not_a_place() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        extractor.on_node(NodeEvent {
            id: 1,
            lon: 0.0,
            lat: 0.0,
            tags: tags(&[("amenity", "cafe")]),
        });
        assert!(extractor.places.is_empty());
    }

    #[test]
    fn addressed_node_is_indexed_street_less() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        extractor.on_node(NodeEvent {
            id: 1,
            lon: 19.0,
            lat: 52.0,
            tags: tags(&[("addr:housenumber", "5")]),
        });
        assert_eq!(extractor.places.len(), 1);
        assert_eq!(extractor.places[0].pid, "n1");
        assert_eq!(extractor.street_less_index.len(), 1);
    }

    #[test]
    fn postal_code_node_feeds_simc_table() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        extractor.on_node(NodeEvent {
            id: 2,
            lon: 19.0,
            lat: 52.0,
            tags: tags(&[("postal_code", "00-001"), ("simc", "0918123")]),
        });
        assert_eq!(extractor.simc_to_postcode.get("0918123"), Some(&"00-001".to_string()));
        assert_eq!(extractor.postal_places.len(), 1);
    }

    #[test]
    fn way_with_invalid_location_is_skipped() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        extractor.on_way(WayEvent {
            id: 5,
            node_refs: vec![1, 2],
            tags: tags(&[("addr:housenumber", "5")]),
            linestring: Err(GeometryError::InvalidLocation),
        });
        assert!(extractor.places.is_empty());
    }

    #[test]
    fn admin_area_out_of_window_is_rejected() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0),
        ]]);
        extractor.on_area(AreaEvent {
            id: 10,
            orig_id: 10,
            origin: AreaOrigin::Relation,
            tags: tags(&[("boundary", "administrative"), ("admin_level", "4")]),
            multipolygon: Ok(square),
        });
        assert!(extractor.areas.is_empty());
    }

    #[test]
    fn religious_administrative_area_is_rejected() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0),
        ]]);
        extractor.on_area(AreaEvent {
            id: 11,
            orig_id: 11,
            origin: AreaOrigin::Relation,
            tags: tags(&[("boundary", "administrative"), ("admin_level", "8"), ("religion", "christian")]),
            multipolygon: Ok(square),
        });
        assert!(extractor.areas.is_empty());
    }

    #[test]
    fn valid_admin_area_is_scored_and_stored() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0),
        ]]);
        extractor.on_area(AreaEvent {
            id: 12,
            orig_id: 12,
            origin: AreaOrigin::Way,
            tags: tags(&[
                ("boundary", "administrative"),
                ("admin_level", "8"),
                ("name", "Warsaw"),
                ("teryt:simc", "0918123"),
                ("population", "1000000"),
            ]),
            multipolygon: Ok(square),
        });
        assert_eq!(extractor.areas.len(), 1);
        assert_eq!(extractor.areas[0].quality, 4);
        assert_eq!(extractor.areas[0].admin_level, 8);
    }

    #[test]
    fn addressed_relation_area_becomes_a_place() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0),
        ]]);
        extractor.on_area(AreaEvent {
            id: 13,
            orig_id: 13,
            origin: AreaOrigin::Relation,
            tags: tags(&[("addr:housenumber", "1"), ("name", "City Hall")]),
            multipolygon: Ok(square),
        });
        assert_eq!(extractor.places.len(), 1);
        assert_eq!(extractor.places[0].pid, "r13");
        assert!(extractor.areas.is_empty());
    }

    #[test]
    fn empty_linestring_centroid_failure_counts_as_invalid_location() {
        let mut stats = Stats::new();
        let mut extractor = AddressExtractor::new(&mut stats);
        extractor.on_way(WayEvent {
            id: 6,
            node_refs: vec![],
            tags: tags(&[("addr:housenumber", "5")]),
            linestring: Ok(LineString::new(vec![])),
        });
        assert!(extractor.places.is_empty());
    }
}
