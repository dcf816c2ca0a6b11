use tracing::{debug, info, warn};

use crate::domain::{Coordinate, ZoneFeatures, ZoneId};
use crate::error::ZoneError;

/// Supplies each zone's features on demand.
pub trait ZoneGeometryProvider {
    fn zone_features(&mut self, zone: ZoneId) -> Result<ZoneFeatures, ZoneError>;
}

/// Outcome of searching every zone for a point.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ZoneId),
    /// Every zone loaded and none contains the point.
    NotFound,
    /// No zone matched, but some zones could not be loaded and might have.
    Undetermined { failed: Vec<ZoneError> },
}

impl Resolution {
    pub fn zone(&self) -> Option<ZoneId> {
        match self {
            Resolution::Found(zone) => Some(*zone),
            _ => None,
        }
    }
}

/// Finds the zone polygon containing a point.
///
/// Zones are searched one at a time, coldest to warmest, and the first zone
/// with a containing feature wins. A zone whose geometry cannot be loaded is
/// skipped, so a failure there can hide the true answer.
pub struct ZoneResolver<'a, P: ZoneGeometryProvider + ?Sized> {
    provider: &'a mut P,
}

impl<'a, P: ZoneGeometryProvider + ?Sized> ZoneResolver<'a, P> {
    pub fn new(provider: &'a mut P) -> Self {
        Self { provider }
    }

    pub fn resolve(&mut self, point: &Coordinate) -> Option<ZoneId> {
        self.resolve_detailed(point).zone()
    }

    pub fn resolve_detailed(&mut self, point: &Coordinate) -> Resolution {
        debug!(lat = point.lat(), lon = point.lon(), "Finding zone for point");
        let mut failed = Vec::new();

        for zone in ZoneId::ALL {
            debug!(zone = %zone, "Checking zone");

            let features = match self.provider.zone_features(zone) {
                Ok(features) => features,
                Err(err) => {
                    warn!(zone = %zone, error = %err, "Skipping zone that failed to load");
                    failed.push(err);
                    continue;
                }
            };

            if features.iter().any(|feature| feature.contains(point)) {
                info!(zone = %zone, point = %point, "Found zone");
                return Resolution::Found(zone);
            }
        }

        if failed.is_empty() {
            info!(point = %point, "No zone found for point");
            Resolution::NotFound
        } else {
            warn!(point = %point, failed = failed.len(), "Zone could not be determined");
            Resolution::Undetermined { failed }
        }
    }
}
