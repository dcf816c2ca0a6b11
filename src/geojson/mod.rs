//! GeoJSON model of the per-zone FeatureCollection files.

pub mod parser;

pub use parser::{geometry_to_geojson, parse_zone_collection};

use serde::{Deserialize, Serialize};

/// Raw FeatureCollection as served at `<tier>/zone_<id>.geojson`
#[derive(Debug, Deserialize, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "default_collection_type")]
    pub type_: String,
    pub features: Vec<Feature>,
}

fn default_collection_type() -> String {
    "FeatureCollection".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: FeatureProperties,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FeatureProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Usually a string such as `"-10 to -5"`, occasionally numeric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_range: Option<serde_json::Value>,
}

/// A position is `[lon, lat]` with an optional trailing altitude.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    #[serde(other)]
    Unsupported,
}
