use tracing::info;

use crate::api::{GeocodeMatch, Geocoder};
use crate::domain::{ZipCode, ZoneId};
use crate::error::ZoneMapError;
use crate::layers::{MarkerSpec, RenderSurface, ZoneLayerCache};
use crate::resolver::{Resolution, ZoneResolver};

/// A ZIP code placed in a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipLookupOutcome {
    pub zip: ZipCode,
    pub location: GeocodeMatch,
    pub zone: ZoneId,
}

impl ZipLookupOutcome {
    /// e.g. "90210 is in Zone 10B (Beverly Hills, Los Angeles County, California)"
    pub fn summary(&self) -> String {
        format!(
            "{} is in Zone {} ({})",
            self.zip,
            self.zone.as_str().to_uppercase(),
            self.location.short_name()
        )
    }
}

/// Geocode a ZIP code, find its zone, make that zone visible and pin the
/// location on the map.
///
/// The ZIP is validated before any request is made. The cache is the only
/// path to the map, so the zone and marker are placed through it.
pub fn lookup_zip<G, S>(
    input: &str,
    geocoder: &G,
    cache: &mut ZoneLayerCache<S>,
) -> Result<ZipLookupOutcome, ZoneMapError>
where
    G: Geocoder + ?Sized,
    S: RenderSurface,
{
    let zip = ZipCode::parse(input)?;
    let location = geocoder.geocode(&zip)?;

    let zone = match ZoneResolver::new(&mut *cache).resolve_detailed(&location.coordinate) {
        Resolution::Found(zone) => zone,
        Resolution::NotFound => {
            return Err(ZoneMapError::NotFound(format!(
                "{} located, but zone could not be determined. \
                 The location might be outside the continental US.",
                zip
            )));
        }
        Resolution::Undetermined { failed } => {
            let zones: Vec<&str> = failed.iter().map(|e| e.zone().as_str()).collect();
            return Err(ZoneMapError::NotFound(format!(
                "{} located, but zone could not be determined ({} failed to load: {}).",
                zip,
                if zones.len() == 1 { "zone" } else { "zones" },
                zones.join(", ")
            )));
        }
    };

    info!(zip = %zip, zone = %zone, "ZIP code resolved");
    cache.set_visible(zone, true);
    cache.place_marker(MarkerSpec::for_zone(
        location.coordinate,
        zone,
        location.short_name(),
    ));

    Ok(ZipLookupOutcome {
        zip,
        location,
        zone,
    })
}
