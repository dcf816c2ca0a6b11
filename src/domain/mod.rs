pub mod coordinate;
pub mod feature;
pub mod zone;

pub use coordinate::{Coordinate, ZipCode};
pub use feature::{ZoneFeature, ZoneFeatures, ZoneGeometry};
pub use zone::{ZoneId, ZoneInfo};
