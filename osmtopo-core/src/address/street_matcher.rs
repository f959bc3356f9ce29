//! Street Matcher: a third pass over all ways that, for every
//! drivable highway linestring, updates the nearest street-less places
//! within a bounded corridor.

use geo::EuclideanDistance;
use osmtopo_common::Stats;

use crate::model::Place;
use crate::pbf::{PbfHandler, WayEvent};
use crate::spatial::{expanded_bbox, SpatialIndex};

/// ~200m at mid-latitudes.
pub const MAX_DISTANCE: f64 = 0.002;

const IGNORED_HIGHWAY_TYPES: [&str; 8] = [
    "footway",
    "track",
    "sidewalk",
    "pedestrian",
    "cycleway",
    "service",
    "construction",
    "path",
];

pub struct StreetMatcher<'a> {
    street_less_index: &'a SpatialIndex,
    places: &'a mut [Place],
    stats: &'a mut Stats,
}

impl<'a> StreetMatcher<'a> {
    pub fn new(street_less_index: &'a SpatialIndex, places: &'a mut [Place], stats: &'a mut Stats) -> Self {
        Self {
            street_less_index,
            places,
            stats,
        }
    }
}

impl PbfHandler for StreetMatcher<'_> {
    fn on_way(&mut self, way: WayEvent) {
        self.stats.bump("ways");

        let Some(highway) = way.tags.get("highway") else {
            return;
        };
        self.stats.bump("streets");

        if IGNORED_HIGHWAY_TYPES.contains(&highway) {
            self.stats.bump("ignore_street_type");
            return;
        }

        let name = way.tags.get_or_empty("name");
        if name.is_empty() {
            self.stats.bump("unknown_street");
        }

        let linestring = match way.linestring {
            Ok(ls) => ls,
            Err(_) => {
                self.stats.bump("way_with_invalid_location");
                return;
            }
        };

        let Some((min, max)) = expanded_bbox(&linestring, MAX_DISTANCE) else {
            return;
        };

        let candidates: Vec<u64> = self.street_less_index.intersect_bbox(min, max).collect();
        for ordinal in candidates {
            let Some(place) = self.places.get_mut(ordinal as usize) else {
                continue;
            };

            let distance = linestring.euclidean_distance(&place.geo);
            if distance > MAX_DISTANCE {
                self.stats.bump("street_too_far");
                continue;
            }
            self.stats.bump("street_close_enough");

            if distance < place.street_distance {
                if !place.addr.street.is_empty() {
                    self.stats.bump("place_street_override");
                    if name.is_empty() {
                        self.stats.bump("place_street_keep_named");
                        continue;
                    }
                } else {
                    self.stats.bump("place_street_new");
                }
                place.addr.street = name.clone();
                place.street_distance = distance;
                place.street_id = Some(way.id);
            } else {
                self.stats.bump("place_street_no_override");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Address;
    use crate::pbf::Tags;
    use geo::{LineString, Point};

    fn place_at(lon: f64, lat: f64) -> Place {
        Place::new("n1".to_string(), String::new(), None, Address::default(), Point::new(lon, lat))
    }

    fn way(highway: &str, name: &str, coords: Vec<(f64, f64)>) -> WayEvent {
        WayEvent {
            id: 99,
            node_refs: vec![],
            tags: Tags(vec![
                ("highway".to_string(), highway.to_string()),
                ("name".to_string(), name.to_string()),
            ]),
            linestring: Ok(LineString::from(coords)),
        }
    }

    #[test]
    fn nearby_named_street_adopts_on_empty_place() {
        let mut places = vec![place_at(19.0, 52.0)];
        let mut index = SpatialIndex::empty();
        index.insert_point(0, 19.0, 52.0);
        let mut stats = Stats::new();
        let mut matcher = StreetMatcher::new(&index, &mut places, &mut stats);

        matcher.on_way(way(
            "residential",
            "ul. Testowa",
            vec![(19.0, 51.9995), (19.0, 52.0005)],
        ));

        assert_eq!(places[0].addr.street, "ul. Testowa");
        assert!(places[0].street_distance < MAX_DISTANCE);
        assert_eq!(places[0].street_id, Some(99));
    }

    #[test]
    fn ignored_highway_types_are_skipped() {
        let mut places = vec![place_at(19.0, 52.0)];
        let mut index = SpatialIndex::empty();
        index.insert_point(0, 19.0, 52.0);
        let mut stats = Stats::new();
        let mut matcher = StreetMatcher::new(&index, &mut places, &mut stats);

        matcher.on_way(way("footway", "a path", vec![(19.0, 51.9995), (19.0, 52.0005)]));

        assert_eq!(places[0].addr.street, "");
    }

    #[test]
    fn named_street_is_not_overwritten_by_a_closer_unnamed_one() {
        let mut places = vec![place_at(19.0, 52.0)];
        places[0].addr.street = "ul. Named".to_string();
        places[0].street_distance = 0.001;
        let mut index = SpatialIndex::empty();
        index.insert_point(0, 19.0, 52.0);
        let mut stats = Stats::new();
        let mut matcher = StreetMatcher::new(&index, &mut places, &mut stats);

        matcher.on_way(way("residential", "", vec![(19.0, 51.99999), (19.0, 52.00001)]));

        assert_eq!(places[0].addr.street, "ul. Named", "unnamed street must not replace a named one");
    }

    #[test]
    fn too_far_candidates_are_skipped() {
        let mut places = vec![place_at(19.0, 52.0)];
        let mut index = SpatialIndex::empty();
        index.insert_point(0, 19.0, 52.0);
        let mut stats = Stats::new();
        let mut matcher = StreetMatcher::new(&index, &mut places, &mut stats);

        // ~2 degrees away, far outside MAX_DISTANCE.
        matcher.on_way(way("residential", "ul. Far", vec![(21.0, 52.0), (22.0, 52.0)]));

        assert_eq!(places[0].addr.street, "");
    }
}
