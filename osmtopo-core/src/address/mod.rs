//! Address Resolver: Extractor -> Geometry Matcher -> Street Matcher
//! -> Area Resolver, run as four sequential passes
//! over the same PBF source.

pub mod area_resolver;
pub mod extractor;
pub mod geometry_matcher;
pub mod postcode;
pub mod sink;
pub mod street_matcher;
pub mod tags;

use osmtopo_common::{Result, Stats};

use crate::pbf::PbfSource;
use extractor::AddressExtractor;
use geometry_matcher::GeometryMatcher;
use sink::AddressSink;
use street_matcher::StreetMatcher;

/// Runs all four address-resolution passes against `source` and writes
/// every resulting `Place` into `sink`.
pub fn run<Src, Sink>(source: &Src, sink: &mut Sink, stats: &mut Stats) -> Result<()>
where
    Src: PbfSource,
    Src::Error: Into<osmtopo_common::Error>,
    Sink: AddressSink,
{
    let mut extractor = AddressExtractor::new(stats);
    source.run(&mut extractor).map_err(Into::into)?;

    let AddressExtractor {
        mut places,
        relations,
        areas,
        mut street_less_index,
        ..
    } = extractor;

    {
        let mut matcher = GeometryMatcher::new(&relations, &mut places, &mut street_less_index, stats);
        source.run(&mut matcher).map_err(Into::into)?;
    }

    {
        let mut matcher = StreetMatcher::new(&street_less_index, &mut places, stats);
        source.run(&mut matcher).map_err(Into::into)?;
    }

    // Ordinals in `street_less_index` are about to be invalidated by the
    // sort inside `area_resolver::finish`.
    drop(street_less_index);

    area_resolver::finish(&mut places, &areas, stats);

    for place in &places {
        sink.write_place(place)?;
    }
    sink.finish()?;

    Ok(())
}
