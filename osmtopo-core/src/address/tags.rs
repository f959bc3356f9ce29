//! Tag-to-address mapping (§4.5), shared by the Extractor and the
//! Geometry Matcher.

use osmtopo_common::Stats;

use crate::model::Address;
use crate::pbf::Tags;

/// Builds an [`Address`] from a raw tag bag. Never drops a record - every
/// mismatch or fallback is only ever a stat increment.
pub fn tags_to_address(tags: &Tags, stats: &mut Stats) -> Address {
    let housenumber = tags.get_or_empty("addr:housenumber");

    let city = tags.get("addr:city").unwrap_or_default();
    let city = if city.is_empty() {
        let place = tags.get_or_empty("addr:place");
        if place.is_empty() {
            stats.bump("addr_no_city");
        }
        place
    } else {
        city.to_string()
    };

    let street = tags.get("addr:street").unwrap_or_default();
    let street = if street.is_empty() {
        let place = tags.get_or_empty("addr:place");
        if place.is_empty() {
            stats.bump("addr_no_street");
        } else {
            stats.bump("addr_with_place_and_street");
        }
        place
    } else {
        street.to_string()
    };

    Address {
        housenumber,
        city,
        street,
        postcode: tags.get_or_empty("addr:postcode"),
        city_simc: tags.get_or_empty("addr:city:simc"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        Tags(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn full_address_maps_every_field() {
        let mut stats = Stats::new();
        let addr = tags_to_address(
            &tags(&[
                ("addr:housenumber", "12"),
                ("addr:city", "Warsaw"),
                ("addr:street", "ul. Testowa"),
                ("addr:postcode", "00-001"),
                ("addr:city:simc", "0918123"),
            ]),
            &mut stats,
        );
        assert_eq!(addr.housenumber, "12");
        assert_eq!(addr.city, "Warsaw");
        assert_eq!(addr.street, "ul. Testowa");
        assert_eq!(addr.postcode, "00-001");
        assert_eq!(addr.city_simc, "0918123");
        assert_eq!(stats.get("addr_no_city"), 0);
        assert_eq!(stats.get("addr_no_street"), 0);
    }

    #[test]
    fn missing_city_and_street_fall_back_to_place() {
        let mut stats = Stats::new();
        let addr = tags_to_address(
            &tags(&[("addr:housenumber", "1"), ("addr:place", "Old Town")]),
            &mut stats,
        );
        assert_eq!(addr.city, "Old Town");
        assert_eq!(addr.street, "Old Town");
        assert_eq!(stats.get("addr_with_place_and_street"), 1);
    }

    #[test]
    fn missing_everything_counts_both_misses() {
        let mut stats = Stats::new();
        let addr = tags_to_address(&tags(&[("addr:housenumber", "1")]), &mut stats);
        assert_eq!(addr.city, "");
        assert_eq!(addr.street, "");
        assert_eq!(stats.get("addr_no_city"), 1);
        assert_eq!(stats.get("addr_no_street"), 1);
    }
}
