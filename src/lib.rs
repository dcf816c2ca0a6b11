//! zonemap - Find and map USDA plant hardiness zones

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod geojson;
pub mod geometry;
pub mod layers;
pub mod lookup;
pub mod resolver;

pub use domain::{Coordinate, ZipCode, ZoneId};
pub use error::{ZoneError, ZoneMapError};
pub use layers::{MapSurface, ZoneLayerCache, ZoneStatus};
pub use lookup::{ZipLookupOutcome, lookup_zip};
pub use resolver::{Resolution, ZoneResolver};
