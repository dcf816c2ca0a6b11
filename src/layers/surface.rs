//! The map rendering surface zone layers are drawn on.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Coord, LineString};
use serde_json::{Value, json};
use thiserror::Error;

use super::style::{LayerStyle, marker_popup, popup_content};
use crate::domain::{Coordinate, ZoneFeatures, ZoneId};
use crate::geojson::geometry_to_geojson;

/// Opaque reference to a layer created on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerHandle(u64);

/// Everything a surface needs to draw one zone.
#[derive(Debug, Clone)]
pub struct LayerSpec {
    pub zone: ZoneId,
    pub features: ZoneFeatures,
    pub style: LayerStyle,
    /// One popup per feature, in feature order.
    pub popups: Vec<String>,
}

impl LayerSpec {
    pub fn for_zone(zone: ZoneId, features: ZoneFeatures) -> Self {
        let popups = features.iter().map(popup_content).collect();
        Self {
            zone,
            features,
            style: LayerStyle::for_zone(zone),
            popups,
        }
    }
}

/// Zoom level the view is set to when centering on a marker.
pub const MARKER_ZOOM: u8 = 8;

/// A pin at a looked-up location, labelled with the zone it falls in.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub coordinate: Coordinate,
    pub zone: ZoneId,
    pub label: String,
    pub popup: String,
}

impl MarkerSpec {
    pub fn for_zone(coordinate: Coordinate, zone: ZoneId, label: impl Into<String>) -> Self {
        Self {
            coordinate,
            zone,
            label: label.into(),
            popup: marker_popup(zone),
        }
    }
}

/// Where the map is centered and how far it is zoomed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("feature {index} is malformed: {reason}")]
    MalformedFeature { index: usize, reason: String },
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerHandle),
}

/// A map that zone layers can be added to and removed from.
///
/// Only the layer cache calls these; nothing else adds or removes zone layers.
pub trait RenderSurface {
    /// Build a layer from `spec` and attach it to the map.
    fn add_layer(&mut self, spec: LayerSpec) -> Result<LayerHandle, RenderError>;

    /// Re-attach a previously built layer.
    fn attach(&mut self, handle: LayerHandle) -> Result<(), RenderError>;

    /// Detach a layer, keeping it for a later `attach`. Unknown handles are ignored.
    fn detach(&mut self, handle: LayerHandle);

    /// Replace the location marker and center the view on it.
    fn place_marker(&mut self, marker: MarkerSpec);
}

struct MapLayer {
    spec: LayerSpec,
    attached: bool,
}

/// In-memory map surface that can export its attached layers as GeoJSON.
#[derive(Default)]
pub struct MapSurface {
    layers: BTreeMap<LayerHandle, MapLayer>,
    next_id: u64,
    marker: Option<MarkerSpec>,
    view: Option<MapView>,
}

impl MapSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self, handle: LayerHandle) -> bool {
        self.layers.get(&handle).is_some_and(|l| l.attached)
    }

    /// Zones with an attached layer, coldest first.
    pub fn attached_zones(&self) -> Vec<ZoneId> {
        let mut zones: Vec<ZoneId> = self
            .layers
            .values()
            .filter(|l| l.attached)
            .map(|l| l.spec.zone)
            .collect();
        zones.sort();
        zones.dedup();
        zones
    }

    pub fn marker(&self) -> Option<&MarkerSpec> {
        self.marker.as_ref()
    }

    /// The view set by the last marker, if any.
    pub fn view(&self) -> Option<MapView> {
        self.view
    }

    /// Number of layers ever built, attached or not.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Attached layers as one FeatureCollection, with simplestyle properties.
    /// The marker, if placed, follows the zone features as a Point.
    pub fn to_feature_collection(&self) -> Value {
        let mut attached: Vec<&MapLayer> = self.layers.values().filter(|l| l.attached).collect();
        attached.sort_by_key(|l| l.spec.zone);

        let mut features: Vec<Value> = attached
            .into_iter()
            .flat_map(|layer| {
                let style = &layer.spec.style;
                layer
                    .spec
                    .features
                    .iter()
                    .zip(&layer.spec.popups)
                    .map(move |(feature, popup)| {
                        json!({
                            "type": "Feature",
                            "properties": {
                                "zone": feature.zone,
                                "title": feature.title,
                                "temperature_range": feature.temperature_range,
                                "fill": style.fill_color,
                                "fill-opacity": style.fill_opacity,
                                "stroke": style.stroke_color,
                                "stroke-width": style.weight,
                                "stroke-opacity": style.opacity,
                                "description": popup,
                            },
                            "geometry": geometry_to_geojson(&feature.geometry),
                        })
                    })
            })
            .collect();

        if let Some(marker) = &self.marker {
            features.push(json!({
                "type": "Feature",
                "properties": {
                    "zone": marker.zone,
                    "name": marker.label,
                    "description": marker.popup,
                    "marker-color": marker.zone.info().color,
                },
                "geometry": {
                    "type": "Point",
                    "coordinates": [marker.coordinate.lon(), marker.coordinate.lat()],
                },
            }));
        }

        json!({ "type": "FeatureCollection", "features": features })
    }

    pub fn write_geojson(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer(writer, &self.to_feature_collection())?;
        Ok(())
    }
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), String> {
    if ring.0.len() < 4 {
        return Err(format!(
            "ring has {} positions, at least 4 required",
            ring.0.len()
        ));
    }
    if let Some(Coord { x, y }) = ring.0.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(format!("non-finite position ({}, {})", x, y));
    }
    Ok(())
}

fn validate_spec(spec: &LayerSpec) -> Result<(), RenderError> {
    for (index, feature) in spec.features.iter().enumerate() {
        for polygon in feature.geometry.polygons() {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .try_for_each(validate_ring)
                .map_err(|reason| RenderError::MalformedFeature { index, reason })?;
        }
    }
    Ok(())
}

impl RenderSurface for MapSurface {
    fn add_layer(&mut self, spec: LayerSpec) -> Result<LayerHandle, RenderError> {
        validate_spec(&spec)?;

        let handle = LayerHandle(self.next_id);
        self.next_id += 1;
        self.layers.insert(
            handle,
            MapLayer {
                spec,
                attached: true,
            },
        );
        Ok(handle)
    }

    fn attach(&mut self, handle: LayerHandle) -> Result<(), RenderError> {
        let layer = self
            .layers
            .get_mut(&handle)
            .ok_or(RenderError::UnknownLayer(handle))?;
        layer.attached = true;
        Ok(())
    }

    fn detach(&mut self, handle: LayerHandle) {
        if let Some(layer) = self.layers.get_mut(&handle) {
            layer.attached = false;
        }
    }

    fn place_marker(&mut self, marker: MarkerSpec) {
        self.view = Some(MapView {
            center: marker.coordinate,
            zoom: MARKER_ZOOM,
        });
        self.marker = Some(marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ZoneFeature, ZoneGeometry};
    use geo::{Polygon, coord};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn features(zone: ZoneId, ring: Vec<Coord<f64>>) -> ZoneFeatures {
        let polygon = Polygon::new(LineString::new(ring), vec![]);
        Arc::new(vec![ZoneFeature::new(zone, ZoneGeometry::Polygon(polygon))])
    }

    fn square() -> Vec<Coord<f64>> {
        vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 0.0, y: 1.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 0.0, y: 0.0 },
        ]
    }

    #[test]
    fn test_add_detach_attach() {
        let mut surface = MapSurface::new();
        let handle = surface
            .add_layer(LayerSpec::for_zone(ZoneId::Z6a, features(ZoneId::Z6a, square())))
            .unwrap();
        assert!(surface.is_attached(handle));
        assert_eq!(surface.attached_zones(), vec![ZoneId::Z6a]);

        surface.detach(handle);
        assert!(!surface.is_attached(handle));
        assert!(surface.attached_zones().is_empty());

        surface.attach(handle).unwrap();
        assert!(surface.is_attached(handle));
        assert_eq!(surface.layer_count(), 1);
    }

    #[test]
    fn test_rejects_malformed_ring() {
        let mut surface = MapSurface::new();
        // geo closes the ring, giving 3 positions
        let short = vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }];
        let err = surface
            .add_layer(LayerSpec::for_zone(ZoneId::Z7a, features(ZoneId::Z7a, short)))
            .unwrap_err();
        assert!(matches!(err, RenderError::MalformedFeature { index: 0, .. }));
        assert_eq!(surface.layer_count(), 0);
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut ring = square();
        ring[1] = coord! { x: f64::NAN, y: 1.0 };
        let mut surface = MapSurface::new();
        assert!(
            surface
                .add_layer(LayerSpec::for_zone(ZoneId::Z7a, features(ZoneId::Z7a, ring)))
                .is_err()
        );
    }

    #[test]
    fn test_attach_unknown_handle() {
        let mut surface = MapSurface::new();
        assert!(surface.attach(LayerHandle(42)).is_err());
        surface.detach(LayerHandle(42));
    }

    #[test]
    fn test_export_attached_layers() {
        let mut surface = MapSurface::new();
        let warm = surface
            .add_layer(LayerSpec::for_zone(ZoneId::Z9a, features(ZoneId::Z9a, square())))
            .unwrap();
        surface
            .add_layer(LayerSpec::for_zone(ZoneId::Z4b, features(ZoneId::Z4b, square())))
            .unwrap();
        surface.detach(warm);

        let dir = tempdir().unwrap();
        let path = dir.path().join("zones.geojson");
        surface.write_geojson(&path).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let features = written["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["properties"]["zone"], "4b");
        assert_eq!(features[0]["properties"]["fill"], "#1E88E5");
        assert_eq!(features[0]["geometry"]["type"], "Polygon");
    }

    #[test]
    fn test_marker_replaces_previous_and_exports_as_point() {
        let mut surface = MapSurface::new();
        let first = Coordinate::new(44.98, -93.27).unwrap();
        surface.place_marker(MarkerSpec::for_zone(first, ZoneId::Z4b, "Minneapolis"));

        let beverly_hills = Coordinate::new(34.10, -118.41).unwrap();
        surface.place_marker(MarkerSpec::for_zone(beverly_hills, ZoneId::Z10b, "Beverly Hills"));
        assert_eq!(surface.marker().unwrap().label, "Beverly Hills");
        assert_eq!(
            surface.view(),
            Some(MapView {
                center: beverly_hills,
                zoom: MARKER_ZOOM
            })
        );

        let exported = surface.to_feature_collection();
        let features = exported["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["geometry"]["coordinates"][0], -118.41);
        assert_eq!(features[0]["geometry"]["coordinates"][1], 34.10);
        assert_eq!(
            features[0]["properties"]["description"],
            "<strong>ZIP Code</strong><br>Zone 10B<br>10b: 35 to 40°F"
        );
    }
}
