//! Address sink contract: where resolved `Place`s end up.
//!
//! CSV serialization itself is out of scope for this crate; only the
//! narrow write interface is specified, so the Address Resolver can be
//! exercised against an in-memory double in tests.

use osmtopo_common::Result;

use crate::model::Place;

/// Header order the CSV adapter (and any other sink) must preserve:
/// `pid,name,city,postcode,street,housenumber,simc,amenity,lon,lat,street_distance,city_from_area,postcode_from_area`.
pub trait AddressSink {
    fn write_place(&mut self, place: &Place) -> Result<()>;

    /// Called once after every place has been written.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory double used by tests.
#[derive(Debug, Default)]
pub struct InMemoryAddressSink {
    pub places: Vec<Place>,
}

impl AddressSink for InMemoryAddressSink {
    fn write_place(&mut self, place: &Place) -> Result<()> {
        self.places.push(place.clone());
        Ok(())
    }
}
