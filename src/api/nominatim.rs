use serde::Deserialize;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::GeocoderConfig;
use crate::domain::{Coordinate, ZipCode};
use crate::error::ZoneMapError;

/// Nominatim usage policy: at most one request per second.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
}

/// Best candidate for a postal code.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub coordinate: Coordinate,
    pub display_name: String,
}

impl GeocodeMatch {
    /// First three comma-separated parts of the display name,
    /// e.g. "Beverly Hills, Los Angeles County, California".
    pub fn short_name(&self) -> String {
        self.display_name
            .split(',')
            .map(str::trim)
            .take(3)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Resolves a ZIP code to an approximate location.
pub trait Geocoder {
    /// # Returns
    /// * `Ok(match)` - First candidate returned by the directory
    /// * `Err(NotFound)` - The directory has no match for the ZIP
    /// * `Err(GeocodeUnavailable)` - Transport failure or non-2xx status
    fn geocode(&self, zip: &ZipCode) -> Result<GeocodeMatch, ZoneMapError>;
}

/// Geocoder backed by the Nominatim search API.
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    url: String,
    country_codes: String,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, ZoneMapError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ZoneMapError::GeocodeUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: config.url.clone(),
            country_codes: config.country_codes.clone(),
            last_request: Mutex::new(None),
        })
    }

    fn throttle(&self) {
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                thread::sleep(MIN_REQUEST_INTERVAL - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, zip: &ZipCode) -> Result<GeocodeMatch, ZoneMapError> {
        self.throttle();
        debug!(zip = %zip, url = %self.url, "Geocoding ZIP code");

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("format", "json"),
                ("countrycodes", self.country_codes.as_str()),
                ("postalcode", zip.as_str()),
                ("limit", "1"),
            ])
            .send()
            .map_err(|e| ZoneMapError::GeocodeUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ZoneMapError::GeocodeUnavailable(format!(
                "Nominatim returned error status: {}",
                response.status()
            )));
        }

        let body = response.text().map_err(|e| {
            ZoneMapError::GeocodeUnavailable(format!("Failed to read response: {}", e))
        })?;

        let found = parse_geocode_response(zip, &body)?;
        info!(zip = %zip, location = %found.coordinate, "Geocoded ZIP code");
        Ok(found)
    }
}

/// Pick the first candidate from a Nominatim JSON array.
fn parse_geocode_response(zip: &ZipCode, body: &str) -> Result<GeocodeMatch, ZoneMapError> {
    let results: Vec<NominatimResult> = serde_json::from_str(body).map_err(|e| {
        ZoneMapError::GeocodeUnavailable(format!("Failed to parse Nominatim JSON response: {}", e))
    })?;

    let result = results.into_iter().next().ok_or_else(|| {
        ZoneMapError::NotFound(format!(
            "ZIP code {} not found. Please check and try again.",
            zip
        ))
    })?;

    let lat: f64 = result.lat.trim().parse().map_err(|_| {
        ZoneMapError::GeocodeUnavailable(format!("Invalid latitude in response: {}", result.lat))
    })?;
    let lon: f64 = result.lon.trim().parse().map_err(|_| {
        ZoneMapError::GeocodeUnavailable(format!("Invalid longitude in response: {}", result.lon))
    })?;

    Ok(GeocodeMatch {
        coordinate: Coordinate::new(lat, lon)?,
        display_name: result.display_name,
    })
}
