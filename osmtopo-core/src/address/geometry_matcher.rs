//! Geometry Matcher: a second pass over all ways that resolves
//! `RelationStub`s collected by the Address Extractor into full `Place`s,
//! now that every way's node locations (and therefore geometry) are
//! available.

use std::collections::HashMap;

use geo::Centroid;
use osmtopo_common::Stats;

use crate::model::{NodeRef, Place, RelationStub};
use crate::pbf::{PbfHandler, WayEvent};
use crate::spatial::SpatialIndex;

pub struct GeometryMatcher<'a> {
    way_ref_to_relation: HashMap<NodeRef, &'a RelationStub>,
    places: &'a mut Vec<Place>,
    street_less_index: &'a mut SpatialIndex,
    stats: &'a mut Stats,
}

impl<'a> GeometryMatcher<'a> {
    pub fn new(
        relations: &'a [RelationStub],
        places: &'a mut Vec<Place>,
        street_less_index: &'a mut SpatialIndex,
        stats: &'a mut Stats,
    ) -> Self {
        let way_ref_to_relation = relations.iter().map(|r| (r.way_ref, r)).collect();
        stats.add("relations", relations.len() as i64);
        Self {
            way_ref_to_relation,
            places,
            street_less_index,
            stats,
        }
    }

    fn index_place(&mut self, place: Place) {
        let ordinal = self.places.len() as u64;
        if place.addr.street.is_empty() {
            self.street_less_index.insert_point(ordinal, place.geo.x(), place.geo.y());
        }
        self.places.push(place);
    }
}

impl PbfHandler for GeometryMatcher<'_> {
    fn on_way(&mut self, way: WayEvent) {
        self.stats.bump("ways");

        let Some(relation) = self.way_ref_to_relation.get(&way.id) else {
            return;
        };

        let linestring = match way.linestring {
            Ok(ls) => ls,
            Err(_) => {
                self.stats.bump("relations_ways_with_invalid_location");
                return;
            }
        };
        let Some(centroid) = linestring.centroid() else {
            self.stats.bump("relations_ways_with_invalid_location");
            return;
        };

        let place = Place::new(
            relation.id.clone(),
            relation.name.clone(),
            relation.amenity.clone(),
            relation.addr.clone(),
            centroid,
        );
        self.index_place(place);
        self.stats.bump("relations_converted_to_places");
    }
}
