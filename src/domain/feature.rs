use geo::{LineString, MultiPolygon, Polygon};
use std::sync::Arc;

use super::ZoneId;

/// Spatial extent of one zone feature, in (lon, lat) order.
///
/// Only exterior rings take part in containment; interior rings are carried
/// through for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl ZoneGeometry {
    /// Exterior rings, one per constituent polygon.
    pub fn exterior_rings(&self) -> Vec<&LineString<f64>> {
        match self {
            ZoneGeometry::Polygon(p) => vec![p.exterior()],
            ZoneGeometry::MultiPolygon(mp) => mp.0.iter().map(|p| p.exterior()).collect(),
        }
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        match self {
            ZoneGeometry::Polygon(p) => std::slice::from_ref(p),
            ZoneGeometry::MultiPolygon(mp) => &mp.0,
        }
    }
}

/// One named feature of a zone's FeatureCollection.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFeature {
    pub zone: ZoneId,
    pub title: String,
    pub temperature_range: String,
    pub geometry: ZoneGeometry,
}

impl ZoneFeature {
    pub fn new(zone: ZoneId, geometry: ZoneGeometry) -> Self {
        let info = zone.info();
        Self {
            zone,
            title: info.title(),
            temperature_range: info.temperature_range.to_string(),
            geometry,
        }
    }
}

/// All features loaded for a zone, shared between the cache and layers.
pub type ZoneFeatures = Arc<Vec<ZoneFeature>>;
