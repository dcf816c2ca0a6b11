use std::fmt;

use crate::error::ZoneMapError;

/// WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ZoneMapError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ZoneMapError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                lat
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ZoneMapError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                lon
            )));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// GeoJSON axis order: x = longitude, y = latitude.
    pub fn to_coord(&self) -> geo::Coord<f64> {
        geo::coord! { x: self.lon, y: self.lat }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lat_dir = if self.lat >= 0.0 { "N" } else { "S" };
        let lon_dir = if self.lon >= 0.0 { "E" } else { "W" };
        write!(
            f,
            "{:.4}{} / {:.4}{}",
            self.lat.abs(),
            lat_dir,
            self.lon.abs(),
            lon_dir
        )
    }
}

/// Five digit US postal code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZipCode(String);

impl ZipCode {
    /// Validate `^\d{5}$` before any network call is made.
    pub fn parse(input: &str) -> Result<Self, ZoneMapError> {
        if input.len() == 5 && input.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(input.to_string()))
        } else {
            Err(ZoneMapError::InvalidInput(
                "Please enter a valid 5-digit ZIP code".to_string(),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
