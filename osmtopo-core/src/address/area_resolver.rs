//! Area Resolver / `finish()`: the final stage that fills missing
//! city and postcode on every `Place` by administrative-area
//! containment, breaking ties by admin level.

use geo::{BoundingRect, Contains, EuclideanDistance};
use osmtopo_common::Stats;

use crate::model::{Area, Place};
use crate::spatial::{IndexedEntry, SpatialIndex};

/// Runs the full resolution pass: sorts `places` (invalidating any
/// street-less index keyed by ordinal - callers must have already
/// discarded it), then fills missing city and postcode from `areas`.
pub fn finish(places: &mut [Place], areas: &[Area], stats: &mut Stats) {
    places.sort_by(|a, b| {
        (&a.addr.city, &a.addr.street, &a.addr.housenumber).cmp(&(&b.addr.city, &b.addr.street, &b.addr.housenumber))
    });

    let area_index = build_area_index(areas);

    fill_missing_cities(places, areas, &area_index, stats);
    fill_missing_postcodes(places, areas, &area_index, stats);
}

fn build_area_index(areas: &[Area]) -> SpatialIndex {
    let entries: Vec<IndexedEntry> = areas
        .iter()
        .enumerate()
        .filter_map(|(idx, area)| {
            let rect = area.geo.bounding_rect()?;
            Some(IndexedEntry {
                id: idx as u64,
                envelope: rstar::AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();
    SpatialIndex::bulk_load(entries)
}

fn candidate_areas<'a>(place: &Place, areas: &'a [Area], area_index: &SpatialIndex) -> Vec<&'a Area> {
    let mut candidates: Vec<&Area> = area_index
        .intersect_point(place.geo.x(), place.geo.y())
        .filter_map(|idx| areas.get(idx as usize))
        .collect();
    // Largest to smallest administrative granularity, so a level-8 city
    // match is found before a level-9 district one.
    candidates.sort_by_key(|area| area.admin_level);
    candidates
}

fn fill_missing_cities(places: &mut [Place], areas: &[Area], area_index: &SpatialIndex, stats: &mut Stats) {
    for place in places.iter_mut() {
        if !place.addr.city.is_empty() {
            continue;
        }
        let candidates = candidate_areas(place, areas, area_index);
        if candidates.is_empty() {
            stats.bump("place_without_region");
            continue;
        }

        for area in candidates {
            if !area.geo.contains(&place.geo) {
                stats.bump("bounding_box_but_no_match");
                continue;
            }

            place.addr.city = area.name.clone();
            place.city_from_area = true;

            let distance = place.geo.euclidean_distance(&area.centroid);
            stats.watermark_max("max_area_distance", distance);
            stats.bump(&format!("matched_area_lvl{}", area.admin_level));

            if area.admin_level == 8 {
                break;
            }
        }
    }
}

fn fill_missing_postcodes(places: &mut [Place], areas: &[Area], area_index: &SpatialIndex, stats: &mut Stats) {
    for place in places.iter_mut() {
        if !place.addr.postcode.is_empty() {
            continue;
        }
        let candidates = candidate_areas(place, areas, area_index);
        if candidates.is_empty() {
            continue;
        }

        for area in candidates {
            if !area.geo.contains(&place.geo) {
                continue;
            }

            if !area.postcode.is_empty() {
                place.addr.postcode = area.postcode.clone();
                place.postcode_from_area = true;
            }

            let distance = place.geo.euclidean_distance(&area.centroid);
            stats.watermark_max("max_area_distance", distance);
            stats.bump(&format!("matched_area_lvl{}", area.admin_level));

            if area.admin_level == 8 {
                break;
            }
        }
    }
}
