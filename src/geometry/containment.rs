//! Point-in-zone containment by ray casting.
//!
//! A horizontal ray is cast from the point towards +x (east) and the number of
//! ring edges it crosses is counted; odd parity means inside. Comparisons are
//! exact: a point lying precisely on an edge gets whatever answer the
//! floating-point arithmetic produces, with no tolerance applied.

use geo::{Coord, LineString};

use crate::domain::{Coordinate, ZoneFeature, ZoneGeometry};

/// Ray-casting test against a single ring of (x = lon, y = lat) positions.
///
/// The ring is treated as implicitly closed: edge `(i, j)` pairs each vertex
/// with its predecessor, starting from the last vertex. A repeated closing
/// vertex forms a horizontal zero-length edge and never toggles parity.
pub fn ring_contains(ring: &[Coord<f64>], point: Coord<f64>) -> bool {
    let Coord { x, y } = point;
    let mut inside = false;

    let Some(mut j) = ring.len().checked_sub(1) else {
        return false;
    };

    for (i, vi) in ring.iter().enumerate() {
        let vj = ring[j];

        // Exactly one endpoint strictly above the ray
        if (vi.y > y) != (vj.y > y) {
            let x_cross = (vj.x - vi.x) * (y - vi.y) / (vj.y - vi.y) + vi.x;
            if x < x_cross {
                inside = !inside;
            }
        }

        j = i;
    }

    inside
}

fn line_contains(ring: &LineString<f64>, point: Coord<f64>) -> bool {
    ring_contains(&ring.0, point)
}

impl ZoneGeometry {
    /// True if the exterior ring of any constituent polygon contains `point`.
    pub fn contains(&self, point: &Coordinate) -> bool {
        let coord = point.to_coord();
        self.exterior_rings()
            .into_iter()
            .any(|ring| line_contains(ring, coord))
    }
}

impl ZoneFeature {
    pub fn contains(&self, point: &Coordinate) -> bool {
        self.geometry.contains(point)
    }
}
