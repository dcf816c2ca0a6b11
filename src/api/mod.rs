pub mod nominatim;
pub mod zones;

pub use nominatim::{GeocodeMatch, Geocoder, NominatimGeocoder};
pub use zones::{DirGeometrySource, GeometrySource, HttpGeometrySource, source_for};
