use serde::Serialize;

use crate::domain::{ZoneFeature, ZoneId};

/// Stroke drawn around every zone polygon.
pub const STROKE_COLOR: &str = "#333";

/// Paint settings for one zone layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStyle {
    pub fill_color: String,
    pub stroke_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl LayerStyle {
    /// Zone color fill at 70% over a solid dark outline.
    pub fn for_zone(zone: ZoneId) -> Self {
        Self {
            fill_color: zone.info().color.to_string(),
            stroke_color: STROKE_COLOR.to_string(),
            weight: 2.0,
            opacity: 1.0,
            fill_opacity: 0.7,
        }
    }
}

pub fn popup_content(feature: &ZoneFeature) -> String {
    format!(
        "<strong>Zone {}</strong><br>{}<br>Temperature Range: {}°F",
        feature.zone.as_str().to_uppercase(),
        feature.title,
        feature.temperature_range
    )
}

/// Popup for the marker dropped on a looked-up ZIP code.
pub fn marker_popup(zone: ZoneId) -> String {
    format!(
        "<strong>ZIP Code</strong><br>Zone {}<br>{}",
        zone.as_str().to_uppercase(),
        zone.info().title()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ZoneGeometry;
    use geo::{LineString, Polygon};

    #[test]
    fn test_style_for_zone() {
        let style = LayerStyle::for_zone(ZoneId::Z6b);
        assert_eq!(style.fill_color, "#81C784");
        assert_eq!(style.stroke_color, "#333");
        assert_eq!(style.weight, 2.0);
        assert_eq!(style.fill_opacity, 0.7);
    }

    #[test]
    fn test_popup_content() {
        let geometry = ZoneGeometry::Polygon(Polygon::new(LineString::new(vec![]), vec![]));
        let feature = ZoneFeature::new(ZoneId::Z10a, geometry);
        assert_eq!(
            popup_content(&feature),
            "<strong>Zone 10A</strong><br>10a: 30 to 35°F<br>Temperature Range: 30 to 35°F"
        );
    }

    #[test]
    fn test_marker_popup() {
        assert_eq!(
            marker_popup(ZoneId::Z10b),
            "<strong>ZIP Code</strong><br>Zone 10B<br>10b: 35 to 40°F"
        );
    }
}
