//! Maps a way's `highway` tag value to the routable classification code
//! the topology store persists as `r_ways.type`.
//!
//! Any `highway` value not listed here is not a street for routing
//! purposes and the way is filtered out by the Topology Builder.
//!
//! ref: <https://wiki.openstreetmap.org/wiki/Key:highway>

/// Look up the classification code for a `highway` tag value.
///
/// Returns `None` for unrecognized or unroutable values (`footway`,
/// `track`, ...), which callers treat as "filter this way out".
pub fn classify(highway: &str) -> Option<u16> {
    Some(match highway {
        "motorway" => 100,
        "motorway_link" => 101,
        "motorway_junction" => 102,
        "trunk" => 200,
        "trunk_link" => 201,
        "primary" => 300,
        "primary_link" => 301,
        "secondary" => 400,
        "secondary_link" => 401,
        "tertiary" => 500,
        "tertiary_link" => 501,
        "unclassified" => 600,
        "residential" => 700,
        "living_street" => 701,
        "service" => 900,
        "road" => 1100,
        _ => return None,
    })
}
