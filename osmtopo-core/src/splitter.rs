//! Way Splitter: breaks a way's node list into sub-ways no longer
//! than `max_meters`, inserting synthetic nodes where no existing node
//! falls close enough to the cut point.
//!
//! Distance is a Euclidean chord in degrees, not a geographic distance -
//! cheap to compute at the volumes the Topology Builder streams through,
//! and accurate enough at the mid-latitudes the conversion constant below
//! is calibrated for.

use std::collections::HashSet;

use crate::model::NodeRef;
use crate::nodemap::NodeCoordMap;

/// Meters per degree near 52°N (see `m2deg`/`deg2m` below), averaging the
/// latitudinal, longitudinal and diagonal conversions around central
/// Poland: 52.0393°N, 19.4866°E.
pub const METERS_PER_DEGREE: f64 = 90634.692934;

pub fn m2deg(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

pub fn deg2m(degrees: f64) -> f64 {
    degrees * METERS_PER_DEGREE
}

fn chord(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Allocates a synthetic node id as `original_id * 10000 + k`, probing by
/// `+10` until an id the coordinate map doesn't already know about is
/// found. Collisions happen when the same original id triggers more than
/// one overflow across adjacent segments of a long way.
fn alloc_synthetic_id(original_id: NodeRef, k: i64, node_map: &NodeCoordMap) -> NodeRef {
    let mut candidate = original_id * 10000 + k;
    while node_map.contains(candidate) {
        candidate += 10;
    }
    candidate
}

/// Splits a way's node list so that no sub-way's summed chord length
/// exceeds `max_meters`.
///
/// Every id in `node_refs` must already have a coordinate in `node_map`.
/// Synthetic nodes created along the way are inserted into `node_map` and
/// recorded in `intersections`, since they become routing vertices.
///
/// Returns an empty `Vec` for inputs with fewer than 2 nodes, since no
/// edge can be formed from a single point.
pub fn split(
    node_refs: &[NodeRef],
    node_map: &mut NodeCoordMap,
    intersections: &mut HashSet<NodeRef>,
    max_meters: f64,
) -> Vec<Vec<NodeRef>> {
    let max_degrees = m2deg(max_meters);

    let mut length = 0.0;
    let mut split_ways: Vec<Vec<NodeRef>> = Vec::new();
    let mut current_way: Vec<NodeRef> = Vec::new();

    let mut prev_coord: Option<(f64, f64)> = None;

    for &id in node_refs {
        let cur_coord = node_map
            .get(id)
            .expect("way node id must already be present in the coordinate map");

        let Some(prev) = prev_coord else {
            current_way.push(id);
            prev_coord = Some(cur_coord);
            continue;
        };

        let distance = chord(prev, cur_coord);

        if length + distance <= max_degrees {
            current_way.push(id);
            length += distance;
            prev_coord = Some(cur_coord);
            continue;
        }

        if current_way.len() >= 2 && distance <= max_degrees {
            // The previous node alone is close enough to cut at - no
            // synthetic node needed.
            split_ways.push(std::mem::take(&mut current_way));
            let split_point = *split_ways.last().unwrap().last().unwrap();
            current_way = vec![split_point, id];
            length = distance;
            intersections.insert(split_point);
            prev_coord = Some(cur_coord);
            continue;
        }

        // Overflow with no existing node close enough: interpolate.
        let vector = ((cur_coord.0 - prev.0) / distance, (cur_coord.1 - prev.1) / distance);
        let times = ((length + distance) / max_degrees).floor() as i64;

        let mut anchor = prev;
        for k in 0..times {
            let step = if k == 0 { max_degrees - length } else { max_degrees };
            anchor = (anchor.0 + vector.0 * step, anchor.1 + vector.1 * step);

            let synthetic_id = alloc_synthetic_id(id, k, node_map);
            node_map
                .insert_coord(synthetic_id, anchor.0, anchor.1)
                .expect("in-memory/sparse-file insert should not fail mid-split");
            intersections.insert(synthetic_id);

            current_way.push(synthetic_id);
            split_ways.push(std::mem::take(&mut current_way));
            current_way = vec![synthetic_id];
            length = 0.0;
        }

        current_way.push(id);
        prev_coord = Some(cur_coord);
    }

    if current_way.len() > 1 {
        split_ways.push(current_way);
    }

    split_ways
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodemap::{NodeCacheBackend, NodeCoordMap};

    fn map_with(nodes: &[(NodeRef, f64, f64)]) -> NodeCoordMap {
        let mut map = NodeCoordMap::new(&NodeCacheBackend::InMemory).unwrap();
        for &(id, lon, lat) in nodes {
            map.insert_coord(id, lon, lat).unwrap();
        }
        map
    }

    #[test]
    fn trivial_split_keeps_a_single_subway() {
        // ~90.6m apart, well under a 200m budget.
        let mut map = map_with(&[(1, 0.0, 0.0), (2, 0.0, 0.001)]);
        let mut intersections = HashSet::new();
        let result = split(&[1, 2], &mut map, &mut intersections, 200.0);
        assert_eq!(result, vec![vec![1, 2]]);
        assert!(intersections.is_empty());
    }

    #[test]
    fn single_point_produces_no_subway() {
        let mut map = map_with(&[(1, 0.0, 0.0)]);
        let mut intersections = HashSet::new();
        let result = split(&[1], &mut map, &mut intersections, 200.0);
        assert!(result.is_empty());
    }

    #[test]
    fn long_single_segment_gets_a_synthetic_node() {
        // ~906m apart; a 500m budget forces exactly one synthetic node.
        let mut map = map_with(&[(1, 0.0, 0.0), (2, 0.0, 0.01)]);
        let mut intersections = HashSet::new();
        let result = split(&[1, 2], &mut map, &mut intersections, 500.0);

        assert_eq!(result.len(), 2, "overlong segment must split into >= 2 sub-ways");
        let synthetic_id = *result[0].last().unwrap();
        assert_ne!(synthetic_id, 1);
        assert_ne!(synthetic_id, 2);
        assert!(intersections.contains(&synthetic_id));

        let (lon, lat) = map.get(synthetic_id).unwrap();
        assert!((lon - 0.0).abs() < 1e-9);
        assert!((lat - 0.00552).abs() < 1e-4);

        // Both endpoints of the original segment end up as intersections
        // downstream too since they bound a split sub-way.
        assert_eq!(result[1].last(), Some(&2));
    }

    #[test]
    fn synthetic_id_probes_on_collision() {
        // Node 2 is the one that triggers the overflow here, so the first
        // candidate synthetic id is 2*10000; pre-occupy it so the
        // splitter must probe.
        let mut map = map_with(&[(1, 0.0, 0.0), (2, 0.0, 0.01), (2 * 10000, 9.0, 9.0)]);
        let mut intersections = HashSet::new();
        let result = split(&[1, 2], &mut map, &mut intersections, 500.0);

        let synthetic_id = *result[0].last().unwrap();
        assert_ne!(synthetic_id, 20000, "must probe past the occupied id");
        assert_eq!(synthetic_id, 20010);
    }

    #[test]
    fn existing_node_at_cut_point_avoids_synthesis() {
        // Three points: first segment short, second segment also short,
        // but their sum exceeds max_degrees, and the second segment alone
        // fits - so the splitter should cut at node 2 without inventing
        // a synthetic point.
        let mut map = map_with(&[(1, 0.0, 0.0), (2, 0.0, 0.004), (3, 0.0, 0.008)]);
        let mut intersections = HashSet::new();
        // max_meters chosen so 0.004deg ~ 362m fits but 0.008deg ~ 725m
        // doesn't, and two segments summed (0.008) doesn't either.
        let result = split(&[1, 2, 3], &mut map, &mut intersections, 500.0);

        assert_eq!(result, vec![vec![1, 2], vec![2, 3]]);
        assert!(intersections.contains(&2));
    }
}
