pub mod cache;
pub mod style;
pub mod surface;

pub use cache::{LayerState, StatusListener, ZoneLayerCache, ZoneStatus};
pub use style::{LayerStyle, marker_popup, popup_content};
pub use surface::{LayerHandle, LayerSpec, MapSurface, MarkerSpec, RenderError, RenderSurface};
