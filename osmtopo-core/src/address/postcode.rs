//! Postcode resolution (§4.7), used by the Address Extractor while
//! building an [`Area`](crate::model::Area).

use std::collections::HashMap;

use geo::{Contains, MultiPolygon};

use crate::model::PostalPlace;

/// Resolves an area's postcode from, in order: the `simc → postcode`
/// table, a name/containment match against known postal places, or
/// failing that the last postal place found inside the polygon.
pub fn get_postcode(
    simc: &str,
    area_name: &str,
    polygon: &MultiPolygon<f64>,
    simc_to_postcode: &HashMap<String, String>,
    postal_places: &[PostalPlace],
) -> String {
    if !simc.is_empty() {
        if let Some(postcode) = simc_to_postcode.get(simc) {
            return postcode.clone();
        }
    }

    for place in postal_places {
        let name_matches = place.name == area_name || place.is_in.contains(area_name);
        if name_matches && polygon.contains(&place.point) {
            return place.postcode.clone();
        }
    }

    let mut fallback = String::new();
    for place in postal_places {
        if polygon.contains(&place.point) {
            fallback = place.postcode.clone();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 10.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn simc_lookup_takes_priority() {
        let mut table = HashMap::new();
        table.insert("0918123".to_string(), "00-001".to_string());
        let result = get_postcode("0918123", "Warsaw", &unit_square(), &table, &[]);
        assert_eq!(result, "00-001");
    }

    #[test]
    fn name_match_with_containment_wins_without_simc() {
        let places = vec![PostalPlace {
            name: "Warsaw".to_string(),
            is_in: String::new(),
            postcode: "00-002".to_string(),
            point: point!(x: 5.0, y: 5.0),
        }];
        let result = get_postcode("", "Warsaw", &unit_square(), &HashMap::new(), &places);
        assert_eq!(result, "00-002");
    }

    #[test]
    fn falls_back_to_last_contained_place() {
        let places = vec![
            PostalPlace {
                name: "Other".to_string(),
                is_in: String::new(),
                postcode: "00-003".to_string(),
                point: point!(x: 1.0, y: 1.0),
            },
            PostalPlace {
                name: "AnotherOther".to_string(),
                is_in: String::new(),
                postcode: "00-004".to_string(),
                point: point!(x: 2.0, y: 2.0),
            },
        ];
        let result = get_postcode("", "Warsaw", &unit_square(), &HashMap::new(), &places);
        assert_eq!(result, "00-004", "last contained place wins when nothing names-matches");
    }

    #[test]
    fn no_match_returns_empty() {
        let result = get_postcode("", "Warsaw", &unit_square(), &HashMap::new(), &[]);
        assert_eq!(result, "");
    }
}
