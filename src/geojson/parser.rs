use geo::{Coord, LineString, MultiPolygon, Polygon};
use tracing::{debug, warn};

use super::{FeatureCollection, Geometry, Position};
use crate::domain::{ZoneFeature, ZoneGeometry, ZoneId};
use crate::error::ZoneError;

/// Parse a zone FeatureCollection into domain features owned by `zone`.
///
/// # Algorithm
/// 1. Deserialize the collection; malformed JSON is a fetch failure
/// 2. For each feature with a Polygon or MultiPolygon geometry:
///    - First ring of each polygon is the exterior, the rest are holes
///    - Title and temperature range fall back to the zone table
/// 3. Features with no geometry or another geometry type are skipped
pub fn parse_zone_collection(zone: ZoneId, text: &str) -> Result<Vec<ZoneFeature>, ZoneError> {
    let collection: FeatureCollection = serde_json::from_str(text)
        .map_err(|e| ZoneError::fetch(zone, format!("Invalid GeoJSON: {}", e)))?;

    let mut features = Vec::with_capacity(collection.features.len());

    for (i, feature) in collection.features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => {
                ZoneGeometry::Polygon(to_polygon(zone, &coordinates)?)
            }
            Some(Geometry::MultiPolygon { coordinates }) => {
                let polygons = coordinates
                    .iter()
                    .map(|rings| to_polygon(zone, rings))
                    .collect::<Result<Vec<_>, _>>()?;
                ZoneGeometry::MultiPolygon(MultiPolygon::new(polygons))
            }
            Some(Geometry::Unsupported) | None => {
                debug!(zone = %zone, feature = i, "Skipping feature without polygon geometry");
                continue;
            }
        };

        let props = feature.properties;
        if let Some(declared) = props.zone.as_deref()
            && declared.parse::<ZoneId>().ok() != Some(zone)
        {
            warn!(zone = %zone, declared, "Feature declares a different zone");
        }

        let mut parsed = ZoneFeature::new(zone, geometry);
        if let Some(title) = props.title {
            parsed.title = title;
        }
        match props.temperature_range {
            Some(serde_json::Value::String(range)) => parsed.temperature_range = range,
            Some(serde_json::Value::Null) | None => {}
            Some(other) => parsed.temperature_range = other.to_string(),
        }
        features.push(parsed);
    }

    Ok(features)
}

fn to_polygon(zone: ZoneId, rings: &[Vec<Position>]) -> Result<Polygon<f64>, ZoneError> {
    let mut lines = rings
        .iter()
        .map(|ring| to_line(zone, ring))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let exterior = lines.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, lines.collect()))
}

fn to_line(zone: ZoneId, ring: &[Position]) -> Result<LineString<f64>, ZoneError> {
    ring.iter()
        .map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Ok(geo::coord! { x: *lon, y: *lat }),
            _ => Err(ZoneError::fetch(
                zone,
                format!("Invalid GeoJSON position: {:?}", pos),
            )),
        })
        .collect::<Result<Vec<Coord<f64>>, _>>()
        .map(LineString::new)
}

/// Convert domain geometry back to its GeoJSON form for export.
pub fn geometry_to_geojson(geometry: &ZoneGeometry) -> Geometry {
    fn rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect())
            .collect()
    }

    match geometry {
        ZoneGeometry::Polygon(p) => Geometry::Polygon {
            coordinates: rings(p),
        },
        ZoneGeometry::MultiPolygon(mp) => Geometry::MultiPolygon {
            coordinates: mp.0.iter().map(rings).collect(),
        },
    }
}
