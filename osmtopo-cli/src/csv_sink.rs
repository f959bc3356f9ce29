//! CSV-backed `AddressSink`: one row per resolved `Place`, written
//! incrementally so the whole address table never needs to sit in
//! memory at once.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use csv::Writer;
use osmtopo_common::{Error, Result};
use osmtopo_core::address::sink::AddressSink;
use osmtopo_core::model::Place;

pub struct CsvAddressSink {
    writer: Writer<BufWriter<File>>,
}

const HEADER: [&str; 13] = [
    "pid",
    "name",
    "city",
    "postcode",
    "street",
    "housenumber",
    "simc",
    "amenity",
    "lon",
    "lat",
    "street_distance",
    "city_from_area",
    "postcode_from_area",
];

impl CsvAddressSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        let mut writer = Writer::from_writer(BufWriter::new(file));
        writer
            .write_record(HEADER)
            .map_err(|source| Error::Csv(source.to_string()))?;
        Ok(Self { writer })
    }
}

fn bool_flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

impl AddressSink for CsvAddressSink {
    fn write_place(&mut self, place: &Place) -> Result<()> {
        let (lon, lat) = (place.geo.x(), place.geo.y());
        let street_distance = if place.street_distance >= Place::SENTINEL_DISTANCE {
            String::new()
        } else {
            place.street_distance.to_string()
        };
        self.writer
            .write_record([
                place.pid.as_str(),
                place.name.as_str(),
                place.addr.city.as_str(),
                place.addr.postcode.as_str(),
                place.addr.street.as_str(),
                place.addr.housenumber.as_str(),
                place.addr.city_simc.as_str(),
                place.amenity.as_deref().unwrap_or(""),
                &lon.to_string(),
                &lat.to_string(),
                &street_distance,
                bool_flag(place.city_from_area),
                bool_flag(place.postcode_from_area),
            ])
            .map_err(|source| Error::Csv(source.to_string()))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(Error::from)
    }
}
